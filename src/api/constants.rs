// Licensed to the Apache Software Foundation (ASF) under one or more
// contributor license agreements.  See the NOTICE file distributed with
// this work for additional information regarding copyright ownership.
// The ASF licenses this file to You under the Apache License, Version 2.0
// (the "License"); you may not use this file except in compliance with
// the License.  You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:9848";

/// "public" namespace is "".
pub const DEFAULT_NAMESPACE: &str = "";

pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

pub const DEFAULT_CLUSTER_NAME: &str = "DEFAULT";

pub const UNKNOWN: &str = "unknown";

/// label AppName
pub const KEY_LABEL_APP_NAME: &str = "AppName";

/// Default timeout of a single operation, millis.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;

/// env `NACOS_CLIENT_REQUEST_TIMEOUT_MS`, default 3000
pub const ENV_NACOS_CLIENT_REQUEST_TIMEOUT_MS: &str = "NACOS_CLIENT_REQUEST_TIMEOUT_MS";

/// env `NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION`, default true
pub const ENV_NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION: &str =
    "NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION";

/// env `NACOS_CLIENT_NAMING_LOAD_CACHE_AT_START`, default false
pub const ENV_NACOS_CLIENT_NAMING_LOAD_CACHE_AT_START: &str =
    "NACOS_CLIENT_NAMING_LOAD_CACHE_AT_START";

/// env `NACOS_CLIENT_CACHE_DIR`, default `$HOME/nacos`
pub const ENV_NACOS_CLIENT_CACHE_DIR: &str = "NACOS_CLIENT_CACHE_DIR";

/// env `NACOS_CLIENT_LOGGER_LEVEL`, default INFO
pub const ENV_NACOS_CLIENT_LOGGER_LEVEL: &str = "NACOS_CLIENT_LOGGER_LEVEL";

/// env `NACOS_CLIENT_USERNAME`, fallback of [`crate::api::props::ClientOptions::username`]
pub const ENV_NACOS_CLIENT_USERNAME: &str = "NACOS_CLIENT_USERNAME";

/// env `NACOS_CLIENT_PASSWORD`, fallback of [`crate::api::props::ClientOptions::password`]
pub const ENV_NACOS_CLIENT_PASSWORD: &str = "NACOS_CLIENT_PASSWORD";

/// param type, use for publish config
pub const KEY_PARAM_CONTENT_TYPE: &str = "type";

/// param appName, use for publish config
pub const KEY_PARAM_APP_NAME: &str = "appName";

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "text";

pub(crate) const APP_FIELD: &str = "app";

pub(crate) const LABEL_SOURCE: &str = "source";

pub(crate) const LABEL_SOURCE_SDK: &str = "sdk";

pub(crate) const LABEL_MODULE: &str = "module";

pub(crate) const CLIENT_VERSION_PREFIX: &str = "Nacos-Rust-Binding:";

/// Header carrying the token obtained at login.
pub(crate) const ACCESS_TOKEN: &str = "accessToken";

pub(crate) const SERVICE_INFO_SPLITER: &str = "@@";

pub(crate) const CONFIG_GROUP_KEY_SPLITER: &str = "+_+";
