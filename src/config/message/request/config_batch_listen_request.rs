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

use nacos_macro::request;
use serde::{Deserialize, Serialize};

use crate::common::remote::generate_request_id;

/// Listens (or stops listening) to a set of keys, each with the md5 the
/// client holds. The server answers with the keys whose md5 differs.
#[request(identity = "ConfigBatchListenRequest", module = "config")]
pub(crate) struct ConfigBatchListenRequest {
    pub(crate) listen: bool,
    pub(crate) config_listen_contexts: Vec<ConfigListenContext>,
}

impl ConfigBatchListenRequest {
    pub(crate) fn new(listen: bool) -> Self {
        Self {
            listen,
            request_id: Some(generate_request_id()),
            ..Default::default()
        }
    }

    pub(crate) fn config_listen_contexts(mut self, contexts: Vec<ConfigListenContext>) -> Self {
        self.config_listen_contexts = contexts;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConfigListenContext {
    #[serde(rename = "dataId")]
    pub(crate) data_id: String,
    pub(crate) group: String,
    pub(crate) tenant: String,
    pub(crate) md5: String,
}

impl ConfigListenContext {
    pub(crate) fn new(data_id: String, group: String, tenant: String, md5: String) -> Self {
        ConfigListenContext {
            data_id,
            group,
            tenant,
            md5,
        }
    }
}
