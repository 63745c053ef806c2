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

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::codec::ValueCodec;
use crate::api::error::Result;
use crate::api::plugin::AuthPlugin;
use crate::api::props::ClientOptions;
use crate::api::remote::{SessionState, Transport};
use crate::common::executor;
use crate::config::ConfigWorker;

/// Point-in-time snapshot of one config entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NacosConfigResponse {
    /// Namespace/Tenant
    namespace: String,
    data_id: String,
    group: String,
    content: String,
    /// Content's Type; e.g. json,properties,xml,html,text,yaml
    content_type: String,
    /// Content's md5, empty when the entry was deleted.
    md5: String,
}

impl std::fmt::Display for NacosConfigResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut content = self.content.clone();
        if content.len() > 30 {
            let mut end = 30;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content.truncate(end);
            content.push_str("...");
        }
        write!(
            f,
            "NacosConfigResponse(namespace={n},data_id={d},group={g},md5={m},content={c})",
            n = self.namespace,
            d = self.data_id,
            g = self.group,
            m = self.md5,
            c = content
        )
    }
}

impl NacosConfigResponse {
    pub fn new(
        namespace: impl Into<String>,
        data_id: impl Into<String>,
        group: impl Into<String>,
        content: impl Into<String>,
        content_type: impl Into<String>,
        md5: impl Into<String>,
    ) -> Self {
        NacosConfigResponse {
            namespace: namespace.into(),
            data_id: data_id.into(),
            group: group.into(),
            content: content.into(),
            content_type: content_type.into(),
            md5: md5.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
    pub fn data_id(&self) -> &str {
        &self.data_id
    }
    pub fn group(&self) -> &str {
        &self.group
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
    pub fn md5(&self) -> &str {
        &self.md5
    }
}

impl ValueCodec for NacosConfigResponse {}

/// Receives a fresh [`NacosConfigResponse`] whenever the listened content changes.
///
/// Calls for one listener never overlap. Closures taking a
/// [`NacosConfigResponse`] are listeners too.
pub trait ConfigChangeListener: Send + Sync {
    fn on_change(&self, config: NacosConfigResponse);
}

impl<F> ConfigChangeListener for F
where
    F: Fn(NacosConfigResponse) + Send + Sync,
{
    fn on_change(&self, config: NacosConfigResponse) {
        self(config)
    }
}

/// Config client with `async` operations, built by [`ConfigClientBuilder::build_async`].
///
/// Clones share one worker; the session is released when the last clone of
/// every client built from the same options is dropped.
#[derive(Clone)]
pub struct AsyncNacosConfigClient {
    worker: Arc<ConfigWorker>,
    timeout: Duration,
}

impl AsyncNacosConfigClient {
    /// A handle whose operations use `timeout` instead of the configured one.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        AsyncNacosConfigClient {
            worker: self.worker.clone(),
            timeout,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        self.worker.options()
    }

    pub fn session_state(&self) -> SessionState {
        self.worker.session_state()
    }

    /// Get config, return the content.
    ///
    /// Attention to [`crate::api::error::Error::NotFound`].
    pub async fn get_config(&self, data_id: &str, group: &str, namespace: Option<&str>) -> Result<String> {
        self.get_config_resp(data_id, group, namespace)
            .await
            .map(|resp| resp.content)
    }

    pub async fn get_config_resp(
        &self,
        data_id: &str,
        group: &str,
        namespace: Option<&str>,
    ) -> Result<NacosConfigResponse> {
        self.worker
            .get_config(data_id, group, namespace, self.timeout)
            .await
    }

    /// Publish config, return true/false.
    pub async fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        self.worker
            .publish_config(data_id, group, content, None, namespace, self.timeout)
            .await
    }

    /// Cas publish config with cas_md5 (prev content's md5), return true/false.
    pub async fn publish_config_cas(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        cas_md5: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        self.worker
            .publish_config(data_id, group, content, Some(cas_md5), namespace, self.timeout)
            .await
    }

    /// Remove config, return true/false.
    pub async fn remove_config(&self, data_id: &str, group: &str, namespace: Option<&str>) -> Result<bool> {
        self.worker
            .remove_config(data_id, group, namespace, self.timeout)
            .await
    }

    /// Listen the config change. Adding the same listener twice is a no-op.
    pub async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
    ) -> Result<()> {
        self.worker
            .add_listener(data_id, group, listener, self.timeout)
            .await
    }

    /// Remove a Listener.
    pub async fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
    ) -> Result<()> {
        self.worker
            .remove_listener(data_id, group, listener, self.timeout)
            .await
    }
}

/// Blocking config client, built by [`ConfigClientBuilder::build`].
///
/// Each call runs on the client runtime and parks the calling thread.
#[derive(Clone)]
pub struct NacosConfigClient {
    inner: AsyncNacosConfigClient,
}

impl NacosConfigClient {
    /// A handle whose operations use `timeout` instead of the configured one.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        NacosConfigClient {
            inner: self.inner.with_timeout(timeout),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        self.inner.options()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session_state()
    }

    /// The async client sharing this client's worker.
    pub fn as_async(&self) -> &AsyncNacosConfigClient {
        &self.inner
    }

    pub fn get_config(&self, data_id: &str, group: &str, namespace: Option<&str>) -> Result<String> {
        self.get_config_resp(data_id, group, namespace)
            .map(|resp| resp.content)
    }

    pub fn get_config_resp(
        &self,
        data_id: &str,
        group: &str,
        namespace: Option<&str>,
    ) -> Result<NacosConfigResponse> {
        let client = self.inner.clone();
        let (data_id, group, namespace) = owned(data_id, group, namespace);
        executor::block_on(async move {
            client
                .get_config_resp(&data_id, &group, namespace.as_deref())
                .await
        })
    }

    pub fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let client = self.inner.clone();
        let (data_id, group, namespace) = owned(data_id, group, namespace);
        let content = content.to_owned();
        executor::block_on(async move {
            client
                .publish_config(&data_id, &group, &content, namespace.as_deref())
                .await
        })
    }

    pub fn publish_config_cas(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        cas_md5: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let client = self.inner.clone();
        let (data_id, group, namespace) = owned(data_id, group, namespace);
        let (content, cas_md5) = (content.to_owned(), cas_md5.to_owned());
        executor::block_on(async move {
            client
                .publish_config_cas(&data_id, &group, &content, &cas_md5, namespace.as_deref())
                .await
        })
    }

    pub fn remove_config(&self, data_id: &str, group: &str, namespace: Option<&str>) -> Result<bool> {
        let client = self.inner.clone();
        let (data_id, group, namespace) = owned(data_id, group, namespace);
        executor::block_on(async move {
            client
                .remove_config(&data_id, &group, namespace.as_deref())
                .await
        })
    }

    pub fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
    ) -> Result<()> {
        let client = self.inner.clone();
        let (data_id, group, _) = owned(data_id, group, None);
        executor::block_on(async move { client.add_listener(&data_id, &group, listener).await })
    }

    pub fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
    ) -> Result<()> {
        let client = self.inner.clone();
        let (data_id, group, _) = owned(data_id, group, None);
        executor::block_on(async move { client.remove_listener(&data_id, &group, listener).await })
    }
}

fn owned(data_id: &str, group: &str, namespace: Option<&str>) -> (String, String, Option<String>) {
    (
        data_id.to_owned(),
        group.to_owned(),
        namespace.map(str::to_owned),
    )
}

/// Builder of [`NacosConfigClient`] and [`AsyncNacosConfigClient`].
///
/// # Examples
///
/// ```ignore
///  let config_client = nacos_binding::api::config::ConfigClientBuilder::new(
///        nacos_binding::api::props::ClientOptions::new("0.0.0.0:8848", "")
///           .app_name("todo-your-app-name"),
///   )
///   .build()?;
/// ```
#[doc(alias("config", "builder"))]
pub struct ConfigClientBuilder {
    options: ClientOptions,
    transport: Option<Arc<dyn Transport>>,
    auth_plugin: Option<Arc<dyn AuthPlugin>>,
}

impl ConfigClientBuilder {
    pub fn new(options: ClientOptions) -> Self {
        ConfigClientBuilder {
            options,
            transport: None,
            auth_plugin: None,
        }
    }

    /// Link to use instead of the one registered for the server address.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set [`AuthPlugin`], default by credentials of the options.
    pub fn auth_plugin(mut self, auth_plugin: Arc<dyn AuthPlugin>) -> Self {
        self.auth_plugin = Some(auth_plugin);
        self
    }

    /// Builds a blocking client, connecting first when no session exists for the options.
    pub fn build(self) -> Result<NacosConfigClient> {
        let inner = executor::block_on(self.build_async())?;
        Ok(NacosConfigClient { inner })
    }

    pub async fn build_async(self) -> Result<AsyncNacosConfigClient> {
        #[cfg(feature = "tracing-log")]
        crate::common::log::init();

        let timeout = Duration::from_millis(self.options.resolved_request_timeout_ms());
        let worker = ConfigWorker::new(self.options, self.transport, self.auth_plugin).await?;
        Ok(AsyncNacosConfigClient {
            worker: Arc::new(worker),
            timeout,
        })
    }
}
