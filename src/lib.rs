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

#![deny(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Nacos client binding
//!
//! Config and naming clients sharing one session per [`api::props::ClientOptions`].
//!
//! The link to the server is supplied through [`api::remote::Transport`], either
//! registered per `server_addr` with [`api::remote::register_transport`] or handed
//! to a builder directly.
//!
//! ### Example of Config
//!
//! ```ignore
//!  let options = nacos_binding::api::props::ClientOptions::new("127.0.0.1:8848", "")
//!        .app_name("todo-your-app-name");
//!  let config_client = nacos_binding::api::config::ConfigClientBuilder::new(options).build()?;
//!  let content = config_client.get_config("todo-dataid", "LOVE", None)?;
//! ```
//!
//! ### Example of Naming
//!
//! ```ignore
//!  let options = nacos_binding::api::props::ClientOptions::new("127.0.0.1:8848", "");
//!  let naming_client = nacos_binding::api::naming::NamingClientBuilder::new(options).build()?;
//!  naming_client.register_instance("todo-service", "LOVE",
//!        nacos_binding::api::naming::NacosServiceInstance::new("127.0.0.1", 8080))?;
//! ```
//!

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;

const ENV_NACOS_CLIENT_PROPS_FILE_PATH: &str = "NACOS_CLIENT_PROPS_FILE_PATH";

lazy_static! {
    static ref PROPERTIES: HashMap<String, String> = {
        let env_file_path = std::env::var(ENV_NACOS_CLIENT_PROPS_FILE_PATH).ok();
        if let Some(file_path) = env_file_path {
            let _ = dotenvy::from_path(Path::new(&file_path));
        }
        dotenvy::dotenv().ok();

        dotenvy::vars().collect::<HashMap<String, String>>()
    };
}

pub(crate) mod properties {
    use crate::PROPERTIES;

    pub(crate) fn get_value_option<Key>(key: Key) -> Option<String>
    where
        Key: AsRef<str>,
    {
        PROPERTIES.get(key.as_ref()).cloned()
    }

    pub(crate) fn get_value<Key, Default>(key: Key, default: Default) -> String
    where
        Key: AsRef<str>,
        Default: AsRef<str>,
    {
        PROPERTIES
            .get(key.as_ref())
            .map_or(default.as_ref().to_string(), |value| value.to_string())
    }

    pub(crate) fn get_value_u64<Key>(key: Key, default: u64) -> u64
    where
        Key: AsRef<str>,
    {
        PROPERTIES
            .get(key.as_ref())
            .map_or(default, |value| value.trim().parse::<u64>().unwrap_or(default))
    }

    pub(crate) fn get_value_bool<Key>(key: Key, default: bool) -> bool
    where
        Key: AsRef<str>,
    {
        PROPERTIES
            .get(key.as_ref())
            .map_or(default, |value| value.trim().parse::<bool>().unwrap_or(default))
    }
}

/// Nacos API
pub mod api;

mod common;
#[cfg(feature = "config")]
mod config;
#[cfg(feature = "naming")]
mod naming;

#[cfg(test)]
mod test_props {
    use crate::api::constants::ENV_NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION;
    use crate::properties::{get_value, get_value_bool, get_value_option, get_value_u64};

    #[test]
    fn test_get_value() {
        let v = get_value("ENV_TEST", "TEST");
        assert_eq!(v, "TEST");
    }

    #[test]
    fn test_get_value_bool() {
        let v = get_value_bool(ENV_NACOS_CLIENT_NAMING_PUSH_EMPTY_PROTECTION, true);
        assert!(v);
    }

    #[test]
    fn test_get_value_u64() {
        let not_exist_key = "MUST_NOT_EXIST";
        let v = get_value_u64(not_exist_key, 91);
        assert_eq!(v, 91);
        assert!(get_value_option(not_exist_key).is_none());
    }
}
