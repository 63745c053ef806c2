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

use std::collections::HashMap;

use nacos_macro::request;

use crate::common::remote::generate_request_id;

/// Creates or overwrites a config entry.
#[request(identity = "ConfigPublishRequest", module = "config")]
pub(crate) struct ConfigPublishRequest {
    pub(crate) content: String,
    /// md5 the stored content must still have, for compare-and-swap.
    pub(crate) cas_md5: Option<String>,
    pub(crate) addition_map: HashMap<String, String>,
}

impl ConfigPublishRequest {
    pub(crate) fn new(data_id: String, group: String, namespace: String, content: String) -> Self {
        Self {
            request_id: Some(generate_request_id()),
            data_id: Some(data_id),
            group: Some(group),
            namespace: Some(namespace),
            content,
            ..Default::default()
        }
    }

    pub(crate) fn cas_md5(mut self, cas_md5: Option<String>) -> Self {
        self.cas_md5 = cas_md5;
        self
    }

    pub(crate) fn add_addition_param(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.addition_map.insert(key.into(), val.into());
    }
}
