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

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::api::constants::DEFAULT_GROUP;
use crate::api::error::{Error, Result};
use crate::api::naming::{NacosServiceInstance, NamingEventListener};
use crate::api::plugin::AuthPlugin;
use crate::api::props::ClientOptions;
use crate::api::remote::{SessionState, Transport};
use crate::common::cache::CacheBuilder;
use crate::common::error::handle_response;
use crate::common::executor;
use crate::common::remote::handler::HandlerGuard;
use crate::common::remote::message::MessageData;
use crate::common::remote::session::{self, Session, SessionShared};
use crate::naming::chooser::RandomWeightChooser;
use crate::naming::dto::ServiceInfo;
use crate::naming::handler::NamingPushRequestHandler;
use crate::naming::message::request::*;
use crate::naming::message::response::*;
use crate::naming::observable::{ServiceInfoEmitter, ServiceInfoObserver};
use crate::naming::redo::{InstanceRedo, RedoData, SubscribeRedo};

/// Everything a naming client does, on top of a shared session.
pub(crate) struct NamingWorker {
    session: Arc<Session>,
    namespace: String,
    emitter: Arc<ServiceInfoEmitter>,
    observer: Arc<ServiceInfoObserver>,
    redo: Arc<RedoData>,
    request_timeout: Duration,
    redo_task: JoinHandle<()>,
    _push_handler: HandlerGuard,
}

impl NamingWorker {
    pub(crate) async fn new(
        options: ClientOptions,
        transport: Option<Arc<dyn Transport>>,
        auth_plugin: Option<Arc<dyn AuthPlugin>>,
    ) -> Result<Self> {
        let session = session::acquire(options, transport, auth_plugin).await?;
        let options = session.options().clone();
        let namespace = options.get_namespace().to_owned();
        let request_timeout = Duration::from_millis(options.resolved_request_timeout_ms());

        let cache = CacheBuilder::naming(namespace.clone())
            .load_cache_at_start(options.resolved_load_cache_at_start())
            .disk_store()
            .build(format!("{}#{}", options.get_server_addr(), namespace));
        let observer = Arc::new(ServiceInfoObserver::default());
        let emitter = Arc::new(ServiceInfoEmitter::new(
            Arc::new(cache),
            observer.clone(),
            options.resolved_push_empty_protection(),
        ));

        let push_handler = session.handlers().register(
            NotifySubscriberRequest::identity(),
            Arc::new(NamingPushRequestHandler {
                emitter: emitter.clone(),
            }),
        );

        let redo = Arc::new(RedoData::default());
        let redo_task = executor::spawn(
            Self::redo_after_reconnect(
                session.shared(),
                namespace.clone(),
                redo.clone(),
                emitter.clone(),
                request_timeout,
            )
            .in_current_span(),
        );

        Ok(NamingWorker {
            session,
            namespace,
            emitter,
            observer,
            redo,
            request_timeout,
            redo_task,
            _push_handler: push_handler,
        })
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        self.session.options()
    }

    pub(crate) fn session_state(&self) -> SessionState {
        self.session.state()
    }
}

impl Drop for NamingWorker {
    fn drop(&mut self) {
        self.redo_task.abort();

        let cancelled: Vec<SubscribeRedo> = self
            .redo
            .drain_subscribes()
            .into_iter()
            .filter_map(|(key, redo)| {
                self.session
                    .interests()
                    .release(&interest_key(&key))
                    .then_some(redo)
            })
            .collect();
        if !cancelled.is_empty() {
            let session = self.session.shared();
            let namespace = self.namespace.clone();
            let timeout = self.request_timeout;
            executor::spawn(
                async move {
                    for redo in cancelled {
                        if let Err(e) = Self::send_unsubscribe(&session, namespace.clone(), redo, timeout).await {
                            debug!("cancel subscription on close failed: {e}");
                        }
                    }
                }
                .in_current_span(),
            );
        }
        debug!(
            "naming worker of namespace {:?} closed, {} services cached",
            self.namespace,
            self.emitter.cache().len()
        );
    }
}

/// Key of a subscription among the interests of the session.
fn interest_key(key: &str) -> String {
    format!("naming#{key}")
}

/// Checks the service name, returning the group to use.
fn check_service(service_name: &str, group: &str) -> Result<String> {
    if service_name.trim().is_empty() {
        return Err(Error::Validation("service_name must not be empty".to_string()));
    }
    if group.trim().is_empty() {
        return Ok(DEFAULT_GROUP.to_owned());
    }
    Ok(group.to_owned())
}

fn check_instance(instance: &NacosServiceInstance) -> Result<()> {
    if instance.ip.trim().is_empty() {
        return Err(Error::Validation("instance ip must not be empty".to_string()));
    }
    if !(1..=65535).contains(&instance.port) {
        return Err(Error::Validation(format!("instance port {} out of range", instance.port)));
    }
    if !(0.0..=10000.0).contains(&instance.weight) {
        return Err(Error::Validation(format!("instance weight {} out of range", instance.weight)));
    }
    Ok(())
}

/// Whether a failed request may succeed once the link is back.
fn is_transient(e: &Error) -> bool {
    matches!(e, Error::Timeout(_) | Error::Connection(_))
}

impl NamingWorker {
    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn register_instance(
        &self,
        service_name: &str,
        group: &str,
        instance: NacosServiceInstance,
        timeout: Duration,
    ) -> Result<()> {
        let group = check_service(service_name, group)?;
        check_instance(&instance)?;
        let key = ServiceInfo::get_grouped_service_name(service_name, &group);

        self.redo
            .cache_instances(key.clone(), service_name, &group, vec![instance.clone()]);
        let ret = Self::send_instance(
            &self.session,
            REGISTER_INSTANCE,
            instance.clone(),
            self.namespace.clone(),
            service_name.to_owned(),
            group,
            timeout,
        )
        .await;
        if let Err(e) = &ret {
            if !is_transient(e) {
                self.redo.remove_instance(&key, &instance);
            }
        }
        ret
    }

    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn deregister_instance(
        &self,
        service_name: &str,
        group: &str,
        instance: NacosServiceInstance,
        timeout: Duration,
    ) -> Result<()> {
        let group = check_service(service_name, group)?;
        check_instance(&instance)?;
        let key = ServiceInfo::get_grouped_service_name(service_name, &group);

        self.redo.remove_instance(&key, &instance);
        Self::send_instance(
            &self.session,
            DEREGISTER_INSTANCE,
            instance,
            self.namespace.clone(),
            service_name.to_owned(),
            group,
            timeout,
        )
        .await
    }

    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn batch_register_instance(
        &self,
        service_name: &str,
        group: &str,
        instances: Vec<NacosServiceInstance>,
        timeout: Duration,
    ) -> Result<()> {
        let group = check_service(service_name, group)?;
        if instances.is_empty() {
            return Err(Error::Validation("instances must not be empty".to_string()));
        }
        for instance in instances.iter() {
            check_instance(instance)?;
        }
        let key = ServiceInfo::get_grouped_service_name(service_name, &group);

        self.redo
            .cache_instances(key.clone(), service_name, &group, instances.clone());
        let ret = Self::send_batch(
            &self.session,
            instances.clone(),
            self.namespace.clone(),
            service_name.to_owned(),
            group,
            timeout,
        )
        .await;
        if let Err(e) = &ret {
            if !is_transient(e) {
                for instance in instances.iter() {
                    self.redo.remove_instance(&key, instance);
                }
            }
        }
        ret
    }

    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn get_all_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
        timeout: Duration,
    ) -> Result<Vec<NacosServiceInstance>> {
        let group = check_service(service_name, group)?;
        let clusters = clusters.join(",");

        if !subscribe {
            let req = ServiceQueryRequest::new(
                clusters,
                self.namespace.clone(),
                service_name.to_owned(),
                group,
            );
            let resp = self
                .session
                .send_request::<ServiceQueryRequest, QueryServiceResponse>(req, timeout)
                .await?;
            handle_response(&resp, "query_service")?;
            return Ok(resp.service_info.hosts.unwrap_or_default());
        }

        let key = ServiceInfo::get_key(
            &ServiceInfo::get_grouped_service_name(service_name, &group),
            &clusters,
        );
        if self.redo.is_subscribed(&key) {
            if let Some(service_info) = self.emitter.cache().get(&key) {
                return Ok(service_info.hosts.unwrap_or_default());
            }
        }

        let service_info = self
            .subscribe_inner(key.clone(), service_name, group, clusters, timeout)
            .await?;
        Ok(self
            .emitter
            .cache()
            .get(&key)
            .and_then(|cached| cached.hosts)
            .or(service_info.hosts)
            .unwrap_or_default())
    }

    pub(crate) async fn select_instances(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
        healthy: bool,
        timeout: Duration,
    ) -> Result<Vec<NacosServiceInstance>> {
        let instances = self
            .get_all_instances(service_name, group, clusters, subscribe, timeout)
            .await?;
        Ok(instances
            .into_iter()
            .filter(|instance| {
                if healthy {
                    instance.is_available()
                } else {
                    !instance.healthy && instance.is_serving()
                }
            })
            .collect())
    }

    pub(crate) async fn select_one_healthy_instance(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        subscribe: bool,
        timeout: Duration,
    ) -> Result<NacosServiceInstance> {
        let instances = self
            .select_instances(service_name, group, clusters, subscribe, true, timeout)
            .await?;
        RandomWeightChooser::new(service_name, instances)?
            .choose()
            .ok_or_else(|| Error::NotFound(format!("no healthy instance of {service_name}")))
    }

    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn subscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
        timeout: Duration,
    ) -> Result<()> {
        let group = check_service(service_name, group)?;
        let clusters = clusters.join(",");
        let key = ServiceInfo::get_key(
            &ServiceInfo::get_grouped_service_name(service_name, &group),
            &clusters,
        );

        // listen first, the subscribe answer is the first event
        self.observer.subscribe(key.clone(), listener.clone());
        if self.redo.is_subscribed(&key) {
            return Ok(());
        }
        if let Err(e) = self
            .subscribe_inner(key.clone(), service_name, group, clusters, timeout)
            .await
        {
            if !is_transient(&e) {
                self.observer.unsubscribe(&key, &listener);
            }
            return Err(e);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(service_name = service_name, group = group))]
    pub(crate) async fn unsubscribe(
        &self,
        service_name: &str,
        group: &str,
        clusters: Vec<String>,
        listener: Arc<dyn NamingEventListener>,
        timeout: Duration,
    ) -> Result<()> {
        let group = check_service(service_name, group)?;
        let clusters = clusters.join(",");
        let key = ServiceInfo::get_key(
            &ServiceInfo::get_grouped_service_name(service_name, &group),
            &clusters,
        );

        if !self.observer.unsubscribe(&key, &listener) {
            return Ok(());
        }
        let Some(redo) = self.redo.remove_subscribe(&key) else {
            return Ok(());
        };
        // no longer kept current by pushes
        self.emitter.cache().remove(&key);

        if !self.session.interests().release(&interest_key(&key)) {
            info!("no listener of {} left, another client of the session still subscribes", key);
            return Ok(());
        }
        info!("no listener of {} left, cancel the subscription", key);
        Self::send_unsubscribe(&self.session, self.namespace.clone(), redo, timeout).await
    }
}

impl NamingWorker {
    async fn subscribe_inner(
        &self,
        key: String,
        service_name: &str,
        group: String,
        clusters: String,
        timeout: Duration,
    ) -> Result<ServiceInfo> {
        let redo = SubscribeRedo {
            service_name: service_name.to_owned(),
            group_name: group,
            clusters,
        };
        if self.redo.cache_subscribe(key.clone(), redo.clone()) {
            self.session.interests().hold(&interest_key(&key));
        }

        match Self::send_subscribe(&self.session, &self.emitter, self.namespace.clone(), redo, timeout).await {
            Ok(service_info) => Ok(service_info),
            Err(e) => {
                if !is_transient(&e) && self.redo.remove_subscribe(&key).is_some() {
                    self.session.interests().release(&interest_key(&key));
                }
                Err(e)
            }
        }
    }

    async fn send_instance(
        session: &SessionShared,
        r_type: &str,
        instance: NacosServiceInstance,
        namespace: String,
        service_name: String,
        group: String,
        timeout: Duration,
    ) -> Result<()> {
        let req = InstanceRequest::new(r_type, instance, namespace, service_name, group);
        let resp = session
            .send_request::<InstanceRequest, InstanceResponse>(req, timeout)
            .await?;
        handle_response(&resp, r_type)
    }

    async fn send_batch(
        session: &SessionShared,
        instances: Vec<NacosServiceInstance>,
        namespace: String,
        service_name: String,
        group: String,
        timeout: Duration,
    ) -> Result<()> {
        let req = BatchInstanceRequest::new(instances, namespace, service_name, group);
        let resp = session
            .send_request::<BatchInstanceRequest, BatchInstanceResponse>(req, timeout)
            .await?;
        handle_response(&resp, BATCH_REGISTER_INSTANCE)
    }

    async fn send_subscribe(
        session: &SessionShared,
        emitter: &ServiceInfoEmitter,
        namespace: String,
        redo: SubscribeRedo,
        timeout: Duration,
    ) -> Result<ServiceInfo> {
        let req = SubscribeServiceRequest::new(
            true,
            redo.clusters,
            namespace,
            redo.service_name,
            redo.group_name,
        );
        let resp = session
            .send_request::<SubscribeServiceRequest, SubscribeServiceResponse>(req, timeout)
            .await?;
        handle_response(&resp, "subscribe")?;
        if !emitter.emit(resp.service_info.clone()) {
            emitter.seed(resp.service_info.clone());
        }
        Ok(resp.service_info)
    }

    async fn send_unsubscribe(
        session: &SessionShared,
        namespace: String,
        redo: SubscribeRedo,
        timeout: Duration,
    ) -> Result<()> {
        let req = SubscribeServiceRequest::new(
            false,
            redo.clusters,
            namespace,
            redo.service_name,
            redo.group_name,
        );
        let resp = session
            .send_request::<SubscribeServiceRequest, SubscribeServiceResponse>(req, timeout)
            .await?;
        handle_response(&resp, "unsubscribe")
    }

    async fn redo_instances(session: &SessionShared, namespace: &str, redo: InstanceRedo, timeout: Duration) -> Result<()> {
        let InstanceRedo {
            service_name,
            group_name,
            mut instances,
        } = redo;
        if instances.len() == 1 {
            let instance = instances.remove(0);
            return Self::send_instance(
                session,
                REGISTER_INSTANCE,
                instance,
                namespace.to_owned(),
                service_name,
                group_name,
                timeout,
            )
            .await;
        }
        Self::send_batch(session, instances, namespace.to_owned(), service_name, group_name, timeout).await
    }

    /// Registers and subscribes everything again after each reconnect.
    async fn redo_after_reconnect(
        session: Arc<SessionShared>,
        namespace: String,
        redo: Arc<RedoData>,
        emitter: Arc<ServiceInfoEmitter>,
        timeout: Duration,
    ) {
        let mut status = session.subscribe_status();
        let mut epoch = status.borrow_and_update().epoch;
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current.state != SessionState::Connected || current.epoch == epoch {
                continue;
            }
            epoch = current.epoch;

            let instances = redo.instances();
            let subscribes = redo.subscribes();
            info!(
                "session reconnected, redo {} services and {} subscriptions",
                instances.len(),
                subscribes.len()
            );
            for instance_redo in instances {
                let service_name = instance_redo.service_name.clone();
                if let Err(e) = Self::redo_instances(&session, &namespace, instance_redo, timeout).await {
                    error!("redo register of {} failed: {e}", service_name);
                }
            }
            for subscribe_redo in subscribes {
                let service_name = subscribe_redo.service_name.clone();
                if let Err(e) =
                    Self::send_subscribe(&session, &emitter, namespace.clone(), subscribe_redo, timeout).await
                {
                    warn!("redo subscribe of {} failed: {e}", service_name);
                }
            }
        }
    }
}
