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

/// Asks the server for a connection id before setup.
#[request(identity = "ServerCheckRequest", module = "internal")]
pub(crate) struct ServerCheckRequest {}

impl ServerCheckRequest {
    pub(crate) fn new() -> Self {
        Self {
            request_id: Some(generate_request_id()),
            ..Default::default()
        }
    }
}

/// Sent once on the client stream right after the server check.
#[request(identity = "ConnectionSetupRequest", module = "internal")]
pub(crate) struct ConnectionSetupRequest {
    pub(crate) client_version: String,

    pub(crate) tenant: String,

    pub(crate) labels: HashMap<String, String>,
}

#[request(identity = "HealthCheckRequest", module = "internal")]
pub(crate) struct HealthCheckRequest {}

impl HealthCheckRequest {
    pub(crate) fn new() -> Self {
        Self {
            request_id: Some(generate_request_id()),
            ..Default::default()
        }
    }
}

/// Username/password login, answered with an access token.
#[request(identity = "LoginRequest", module = "internal")]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl LoginRequest {
    pub(crate) fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            request_id: Some(generate_request_id()),
            ..Default::default()
        }
    }
}

/// Pushed by the server to probe the client.
#[request(identity = "ClientDetectionRequest", module = "internal")]
pub(crate) struct ClientDetectionRequest {}

/// Pushed by the server to make the client drop this link and connect again.
#[request(identity = "ConnectResetRequest", module = "internal")]
pub(crate) struct ConnectResetRequest {
    pub(crate) server_ip: Option<String>,
    pub(crate) server_port: Option<String>,
}
