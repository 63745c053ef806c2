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

use crate::common::remote::generate_request_id;

/// Subscribes to (or cancels) pushes of a service; answered with its current list.
#[request(identity = "SubscribeServiceRequest", module = "naming")]
pub(crate) struct SubscribeServiceRequest {
    pub(crate) subscribe: bool,

    pub(crate) clusters: String,
}

impl SubscribeServiceRequest {
    pub(crate) fn new(
        subscribe: bool,
        clusters: String,
        namespace: String,
        service_name: String,
        group_name: String,
    ) -> Self {
        Self {
            subscribe,
            clusters,
            request_id: Some(generate_request_id()),
            namespace: Some(namespace),
            service_name: Some(service_name),
            group_name: Some(group_name),
            ..Default::default()
        }
    }
}
