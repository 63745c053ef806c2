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

use nacos_macro::response;

/// Error code answered when the access token is missing or invalid.
pub(crate) const NO_RIGHT: i32 = 403;
/// Error code answered when the credentials are wrong.
pub(crate) const UNAUTHORIZED: i32 = 401;

#[response(identity = "ServerCheckResponse", module = "internal")]
pub(crate) struct ServerCheckResponse {
    pub(crate) connection_id: Option<String>,
}

#[response(identity = "HealthCheckResponse", module = "internal")]
pub(crate) struct HealthCheckResponse {}

#[response(identity = "LoginResponse", module = "internal")]
pub(crate) struct LoginResponse {
    pub(crate) access_token: Option<String>,
    pub(crate) token_ttl: i64,
}

#[response(identity = "ClientDetectionResponse", module = "internal")]
pub(crate) struct ClientDetectionResponse {}

#[response(identity = "ConnectResetResponse", module = "internal")]
pub(crate) struct ConnectResetResponse {}

/// Generic failure the server answers any request with.
#[response(identity = "ErrorResponse", module = "internal")]
pub(crate) struct ErrorResponse {}

impl ErrorResponse {
    pub(crate) fn is_auth_failure(&self) -> bool {
        self.error_code == NO_RIGHT || self.error_code == UNAUTHORIZED
    }
}
