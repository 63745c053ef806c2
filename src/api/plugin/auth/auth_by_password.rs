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

use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::constants::ACCESS_TOKEN;
use crate::api::error::{Error, Result};
use crate::api::plugin::{AuthContext, AuthPlugin, LoginIdentityContext, PASSWORD, USERNAME};
use crate::api::remote::Requester;
use crate::common::remote::message::request::LoginRequest;
use crate::common::remote::message::response::{ErrorResponse, LoginResponse};
use crate::common::remote::message::{Message, MessageBuilder, MessageData, ResponseMessage};

/// Logs in with username/password over the session link.
///
/// The access token of the last successful login is sent with every request.
#[derive(Default)]
pub struct PasswordAuthPlugin {
    login_identity: RwLock<LoginIdentityContext>,
}

#[async_trait]
impl AuthPlugin for PasswordAuthPlugin {
    async fn login(&self, requester: &dyn Requester, auth_context: AuthContext) -> Result<()> {
        let Some(username) = auth_context.param(USERNAME).cloned() else {
            debug!("login skipped, no username");
            return Ok(());
        };
        let password = auth_context.param(PASSWORD).cloned().unwrap_or_default();

        let request = MessageBuilder::new(LoginRequest::new(username.clone(), password))
            .build()
            .into_payload()?;
        let response = requester.request(request).await?;

        if response.message_type() == ErrorResponse::identity() {
            let error = Message::<ErrorResponse>::from_payload(response)?.into_body();
            warn!("login failed, username={username}, error_code={}", error.error_code());
            return Err(Error::Auth(
                error
                    .message()
                    .cloned()
                    .unwrap_or_else(|| format!("login failed, error code {}", error.error_code())),
            ));
        }

        let response = Message::<LoginResponse>::from_payload(response)?.into_body();
        let access_token = match (response.is_success(), response.access_token) {
            (true, Some(token)) => token,
            _ => {
                warn!("login failed, username={username}");
                return Err(Error::Auth(format!("login failed for user {username}")));
            }
        };

        info!("login success, username={username}, token_ttl={}", response.token_ttl);
        let mut identity = self
            .login_identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *identity = LoginIdentityContext::default().add_context(ACCESS_TOKEN, access_token);
        Ok(())
    }

    fn get_login_identity(&self) -> LoginIdentityContext {
        self.login_identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
