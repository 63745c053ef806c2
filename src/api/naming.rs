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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::codec::ValueCodec;
use crate::api::constants::DEFAULT_CLUSTER_NAME;
use crate::api::error::Result;
use crate::api::plugin::AuthPlugin;
use crate::api::props::ClientOptions;
use crate::api::remote::{SessionState, Transport};
use crate::common::executor;
use crate::naming::NamingWorker;

/// One registered endpoint of a service.
///
/// Identity is (ip, port, cluster_name, service_name), the other fields are
/// its state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NacosServiceInstance {
    pub instance_id: Option<String>,

    pub ip: String,

    pub port: i32,

    pub weight: f64,

    pub healthy: bool,

    pub enabled: bool,

    pub ephemeral: bool,

    pub cluster_name: String,

    pub service_name: Option<String>,

    pub metadata: BTreeMap<String, String>,
}

impl NacosServiceInstance {
    pub fn new(ip: impl Into<String>, port: i32) -> Self {
        NacosServiceInstance {
            ip: ip.into(),
            port,
            ..Default::default()
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn ip_and_port(&self) -> String {
        format!("{}:{}", &self.ip, self.port)
    }

    /// Whether both describe the same endpoint of the same cluster.
    pub fn is_same_endpoint(&self, other: &NacosServiceInstance) -> bool {
        self.ip == other.ip && self.port == other.port && self.cluster_name == other.cluster_name
    }

    /// Whether a caller may be routed to this instance.
    pub fn is_available(&self) -> bool {
        self.healthy && self.is_serving()
    }

    /// Enabled with a positive weight, whatever its health.
    pub(crate) fn is_serving(&self) -> bool {
        self.enabled && self.weight > 0.0
    }
}

impl Default for NacosServiceInstance {
    fn default() -> Self {
        Self {
            instance_id: None,
            ip: String::new(),
            port: 0,
            weight: 1.0,
            healthy: true,
            enabled: true,
            ephemeral: true,
            cluster_name: DEFAULT_CLUSTER_NAME.to_owned(),
            service_name: None,
            metadata: BTreeMap::new(),
        }
    }
}

impl ValueCodec for NacosServiceInstance {}

/// What a naming listener receives: the full instance list of one
/// (service, group, clusters) subscription after a change.
#[derive(Clone, Debug, PartialEq)]
pub struct NamingChangeEvent {
    pub service_name: String,
    pub group_name: String,
    /// Comma separated, empty for all clusters.
    pub clusters: String,
    pub instances: Vec<NacosServiceInstance>,
}

/// Receives a [`NamingChangeEvent`] on every effective change of a subscribed
/// service. Calls for one listener never overlap.
pub trait NamingEventListener: Send + Sync {
    fn on_change(&self, event: NamingChangeEvent);
}

impl<F> NamingEventListener for F
where
    F: Fn(NamingChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: NamingChangeEvent) {
        self(event)
    }
}

/// Naming client with `async` operations, built by [`NamingClientBuilder::build_async`].
#[derive(Clone)]
pub struct AsyncNacosNamingClient {
    worker: Arc<NamingWorker>,
    timeout: Duration,
}

impl AsyncNacosNamingClient {
    /// A handle whose operations use `timeout` instead of the configured one.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        AsyncNacosNamingClient {
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

    /// Registers (or updates) an instance. It is registered again after
    /// every reconnect until deregistered.
    pub async fn register_instance(
        &self,
        service_name: &str,
        group: &str,
        instance: NacosServiceInstance,
    ) -> Result<()> {
        self.worker
            .register_instance(service_name, group, instance, self.timeout)
            .await
    }

    pub async fn deregister_instance(
        &self,
        service_name: &str,
        group: &str,
        instance: NacosServiceInstance,
    ) -> Result<()> {
        self.worker
            .deregister_instance(service_name, group, instance, self.timeout)
            .await
    }

    /// Registers several instances of one service in a single request.
    pub async fn batch_register_instance(
        &self,
        service_name: &str,
        group: &str,
        instances: Vec<NacosServiceInstance>,
    ) -> Result<()> {
        self.worker
            .batch_register_instance(service_name, group, instances, self.timeout)
            .await
    }

    /// All instances of the service in `clusters` (empty for all).
    ///
    /// With `subscribe` the first call subscribes and later calls answer from
    /// the cache kept current by server pushes.
    pub async fn get_all_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
    ) -> Result<Vec<NacosServiceInstance>> {
        self.worker
            .get_all_instances(service_name, group, clusters, subscribe, self.timeout)
            .await
    }

    /// Instances whose health equals `healthy`, enabled and with a positive weight.
    pub async fn select_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
        healthy: bool,
    ) -> Result<Vec<NacosServiceInstance>> {
        self.worker
            .select_instances(service_name, group, clusters, subscribe, healthy, self.timeout)
            .await
    }

    /// One healthy instance picked at random by weight.
    ///
    /// Attention to [`crate::api::error::Error::NotFound`].
    pub async fn select_one_healthy_instance(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
    ) -> Result<NacosServiceInstance> {
        self.worker
            .select_one_healthy_instance(service_name, group, clusters, subscribe, self.timeout)
            .await
    }

    pub async fn subscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
    ) -> Result<()> {
        self.worker
            .subscribe(service_name, group, clusters, listener, self.timeout)
            .await
    }

    pub async fn unsubscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
    ) -> Result<()> {
        self.worker
            .unsubscribe(service_name, group, clusters, listener, self.timeout)
            .await
    }
}

/// Blocking naming client, built by [`NamingClientBuilder::build`].
#[derive(Clone)]
pub struct NacosNamingClient {
    inner: AsyncNacosNamingClient,
}

impl NacosNamingClient {
    /// A handle whose operations use `timeout` instead of the configured one.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        NacosNamingClient {
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
    pub fn as_async(&self) -> &AsyncNacosNamingClient {
        &self.inner
    }

    pub fn register_instance(&self, service_name: &str, group: &str, instance: NacosServiceInstance) -> Result<()> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .register_instance(&service_name, &group, instance)
                .await
        })
    }

    pub fn deregister_instance(&self, service_name: &str, group: &str, instance: NacosServiceInstance) -> Result<()> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .deregister_instance(&service_name, &group, instance)
                .await
        })
    }

    pub fn batch_register_instance(
        &self,
        service_name: &str,
        group: &str,
        instances: Vec<NacosServiceInstance>,
    ) -> Result<()> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .batch_register_instance(&service_name, &group, instances)
                .await
        })
    }

    pub fn get_all_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
    ) -> Result<Vec<NacosServiceInstance>> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .get_all_instances(&service_name, &group, clusters, subscribe)
                .await
        })
    }

    pub fn select_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
        healthy: bool,
    ) -> Result<Vec<NacosServiceInstance>> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .select_instances(&service_name, &group, clusters, subscribe, healthy)
                .await
        })
    }

    pub fn select_one_healthy_instance(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
    ) -> Result<NacosServiceInstance> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .select_one_healthy_instance(&service_name, &group, clusters, subscribe)
                .await
        })
    }

    pub fn subscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
    ) -> Result<()> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .subscribe(&service_name, &group, clusters, listener)
                .await
        })
    }

    pub fn unsubscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
    ) -> Result<()> {
        let (client, service_name, group) = self.owned(service_name, group);
        executor::block_on(async move {
            client
                .unsubscribe(&service_name, &group, clusters, listener)
                .await
        })
    }

    fn owned(&self, service_name: &str, group: &str) -> (AsyncNacosNamingClient, String, String) {
        (self.inner.clone(), service_name.to_owned(), group.to_owned())
    }
}

/// Builder of [`NacosNamingClient`] and [`AsyncNacosNamingClient`].
///
/// # Examples
///
/// ```ignore
///  let naming_client = nacos_binding::api::naming::NamingClientBuilder::new(
///        nacos_binding::api::props::ClientOptions::new("0.0.0.0:8848", "")
///           .app_name("todo-your-app-name"),
///   )
///   .build()?;
/// ```
#[doc(alias("naming", "builder"))]
pub struct NamingClientBuilder {
    options: ClientOptions,
    transport: Option<Arc<dyn Transport>>,
    auth_plugin: Option<Arc<dyn AuthPlugin>>,
}

impl NamingClientBuilder {
    pub fn new(options: ClientOptions) -> Self {
        NamingClientBuilder {
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
    pub fn build(self) -> Result<NacosNamingClient> {
        let inner = executor::block_on(self.build_async())?;
        Ok(NacosNamingClient { inner })
    }

    pub async fn build_async(self) -> Result<AsyncNacosNamingClient> {
        #[cfg(feature = "tracing-log")]
        crate::common::log::init();

        let timeout = Duration::from_millis(self.options.resolved_request_timeout_ms());
        let worker = NamingWorker::new(self.options, self.transport, self.auth_plugin).await?;
        Ok(AsyncNacosNamingClient {
            worker: Arc::new(worker),
            timeout,
        })
    }
}
