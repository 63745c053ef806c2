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

use serde::{Deserialize, Serialize};

use crate::api::codec::ValueCodec;
use crate::api::constants::*;
use crate::properties::{get_value_bool, get_value_option, get_value_u64};

/// Configures settings for clients. Equal options share one session.
///
/// Immutable once built; every setter consumes and returns the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOptions {
    /// server_addr like 127.0.0.1:8848
    server_addr: String,
    /// "public" is ""
    namespace: String,
    app_name: Option<String>,
    username: Option<String>,
    password: Option<String>,
    naming_load_cache_at_start: Option<bool>,
    naming_push_empty_protection: Option<bool>,
    request_timeout_ms: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions::new(DEFAULT_SERVER_ADDR, DEFAULT_NAMESPACE)
    }
}

impl ClientOptions {
    pub fn new(server_addr: impl Into<String>, namespace: impl Into<String>) -> Self {
        ClientOptions {
            server_addr: server_addr.into(),
            namespace: namespace.into(),
            app_name: None,
            username: None,
            password: None,
            naming_load_cache_at_start: None,
            naming_push_empty_protection: None,
            request_timeout_ms: None,
        }
    }

    /// Sets the server addr.
    pub fn server_addr(mut self, server_addr: impl Into<String>) -> Self {
        self.server_addr = server_addr.into();
        self
    }

    /// Sets the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the app_name.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Sets the username used at login.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password used at login.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Load the naming disk cache at start, default false.
    pub fn naming_load_cache_at_start(mut self, load: bool) -> Self {
        self.naming_load_cache_at_start = Some(load);
        self
    }

    /// Ignore empty naming pushes, default true.
    pub fn naming_push_empty_protection(mut self, protection: bool) -> Self {
        self.naming_push_empty_protection = Some(protection);
        self
    }

    /// Default timeout of every operation, default 3000ms.
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn get_server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn get_namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get_app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn get_username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn get_password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn get_naming_load_cache_at_start(&self) -> Option<bool> {
        self.naming_load_cache_at_start
    }

    pub fn get_naming_push_empty_protection(&self) -> Option<bool> {
        self.naming_push_empty_protection
    }

    pub fn get_request_timeout_ms(&self) -> Option<u64> {
        self.request_timeout_ms
    }

    pub(crate) fn app_name_or_unknown(&self) -> String {
        self.app_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Credentials from the options, or from the environment.
    pub(crate) fn credentials(&self) -> Option<(String, String)> {
        let username = self
            .username
            .clone()
            .or_else(|| get_value_option(ENV_NACOS_CLIENT_USERNAME))?;
        let password = self
            .password
            .clone()
            .or_else(|| get_value_option(ENV_NACOS_CLIENT_PASSWORD))
            .unwrap_or_default();
        Some((username, password))
    }

    pub(crate) fn resolved_load_cache_at_start(&self) -> bool {
        self.naming_load_cache_at_start
            .unwrap_or_else(|| get_value_bool(ENV_NACOS_CLIENT_NAMING_LOAD_CACHE_AT_START, false))
    }

    pub(crate) fn resolved_push_empty_protection(&self) -> bool {
        self.naming_push_empty_protection.unwrap_or_else(|| {
            get_value_bool(ENV_NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION, true)
        })
    }

    pub(crate) fn resolved_request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms.unwrap_or_else(|| {
            get_value_u64(
                ENV_NACOS_CLIENT_REQUEST_TIMEOUT_MS,
                DEFAULT_REQUEST_TIMEOUT_MS,
            )
        })
    }

    pub(crate) fn client_version(&self) -> String {
        format!("{}{}", CLIENT_VERSION_PREFIX, env!("CARGO_PKG_VERSION"))
    }
}

impl ValueCodec for ClientOptions {}
