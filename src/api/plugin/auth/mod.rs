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

mod auth_by_password;
pub use auth_by_password::*;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::api::error::Result;
use crate::api::remote::Requester;

pub const USERNAME: &str = "username";

pub const PASSWORD: &str = "password";

/// Auth plugin in Client.
///
/// `login` runs on every freshly opened link, before the session is marked
/// connected. An error fails the connect; [`crate::api::error::Error::Auth`]
/// is reported to the caller building the first client.
#[async_trait]
pub trait AuthPlugin: Send + Sync {
    /// Login with [`AuthContext`] over the link's requester.
    async fn login(&self, requester: &dyn Requester, auth_context: AuthContext) -> Result<()>;

    /// Get the [`LoginIdentityContext`], added as headers to every request.
    fn get_login_identity(&self) -> LoginIdentityContext;
}

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub(crate) params: HashMap<String, String>,
}

impl AuthContext {
    /// Add the param.
    pub fn add_param(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.params.insert(key.into(), val.into());
        self
    }

    /// Add the params.
    pub fn add_params(mut self, map: HashMap<String, String>) -> Self {
        self.params.extend(map);
        self
    }

    pub fn param(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginIdentityContext {
    pub(crate) contexts: HashMap<String, String>,
}

impl LoginIdentityContext {
    /// Add the context.
    pub fn add_context(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.contexts.insert(key.into(), val.into());
        self
    }

    /// Add the contexts.
    pub fn add_contexts(mut self, map: HashMap<String, String>) -> Self {
        self.contexts.extend(map);
        self
    }

    pub fn contexts(&self) -> &HashMap<String, String> {
        &self.contexts
    }
}

/// Noop AuthPlugin.
#[derive(Default)]
pub struct NoopAuthPlugin {
    login_identity: LoginIdentityContext,
}

#[async_trait]
impl AuthPlugin for NoopAuthPlugin {
    #[allow(unused_variables)]
    async fn login(&self, requester: &dyn Requester, auth_context: AuthContext) -> Result<()> {
        // noop
        Ok(())
    }

    fn get_login_identity(&self) -> LoginIdentityContext {
        // noop
        self.login_identity.clone()
    }
}
