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
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument, warn};

use super::service_info_diff::{is_outdated_data, ServiceInfoDiff};
use crate::api::naming::{NamingChangeEvent, NamingEventListener};
use crate::common::cache::Cache;
use crate::common::dispatch::Dispatcher;
use crate::naming::dto::ServiceInfo;

struct ListenerEntry {
    listener: Arc<dyn NamingEventListener>,
    dispatcher: Dispatcher<NamingChangeEvent>,
}

fn same_listener(a: &Arc<dyn NamingEventListener>, b: &Arc<dyn NamingEventListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Listeners per service key, each fed through its own dispatcher.
#[derive(Default)]
pub(crate) struct ServiceInfoObserver {
    registry: Mutex<HashMap<String, Vec<ListenerEntry>>>,
}

impl ServiceInfoObserver {
    /// Returns false if the listener was already subscribed to `key`.
    #[instrument(fields(subscribe_key = key), skip_all)]
    pub(crate) fn subscribe(&self, key: String, listener: Arc<dyn NamingEventListener>) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let listeners = registry.entry(key.clone()).or_default();
        if listeners.iter().any(|entry| same_listener(&entry.listener, &listener)) {
            warn!("listener has already subscribed {key:?}");
            return false;
        }

        info!("subscribe {key:?}");
        let callback = listener.clone();
        let dispatcher = Dispatcher::new(
            key,
            Arc::new(move |event: NamingChangeEvent| callback.on_change(event)),
        );
        listeners.push(ListenerEntry {
            listener,
            dispatcher,
        });
        true
    }

    /// Removes the listener, returns true if it was the last one of `key`.
    #[instrument(fields(unsubscribe_key = key), skip_all)]
    pub(crate) fn unsubscribe(&self, key: &str, listener: &Arc<dyn NamingEventListener>) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let Some(listeners) = registry.get_mut(key) else {
            warn!("{key:?} has no listener");
            return false;
        };
        let Some(index) = listeners
            .iter()
            .position(|entry| same_listener(&entry.listener, listener))
        else {
            warn!("listener of {key:?} doesn't exist");
            return false;
        };

        info!("unsubscribe {key:?}");
        listeners.remove(index);
        if listeners.is_empty() {
            registry.remove(key);
            return true;
        }
        false
    }

    pub(crate) fn is_subscribed(&self, key: &str) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    fn notify(&self, key: &str, service_info: &ServiceInfo) {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let Some(listeners) = registry.get(key) else {
            debug!("the key {key:?} has no listener");
            return;
        };

        let event = NamingChangeEvent {
            service_name: service_info.name.clone(),
            group_name: service_info.group_name.clone(),
            clusters: service_info.clusters.clone(),
            instances: service_info.hosts.clone().unwrap_or_default(),
        };
        info!("notify {} listeners of {key:?}", listeners.len());
        for entry in listeners {
            entry.dispatcher.dispatch(event.clone());
        }
    }
}

/// Applies service infos from pushes and query answers to the cache, and
/// notifies the observer of effective changes.
pub(crate) struct ServiceInfoEmitter {
    cache: Arc<Cache<ServiceInfo>>,
    observer: Arc<ServiceInfoObserver>,
    push_empty_protection: bool,
    /// Keeps compare, store and notify of one key atomic.
    process_lock: Mutex<()>,
}

impl ServiceInfoEmitter {
    pub(crate) fn new(
        cache: Arc<Cache<ServiceInfo>>,
        observer: Arc<ServiceInfoObserver>,
        push_empty_protection: bool,
    ) -> Self {
        Self {
            cache,
            observer,
            push_empty_protection,
            process_lock: Mutex::new(()),
        }
    }

    pub(crate) fn cache(&self) -> &Cache<ServiceInfo> {
        &self.cache
    }

    fn is_empty_or_error_push(&self, service_info: &ServiceInfo) -> bool {
        service_info.hosts.is_none() || (self.push_empty_protection && !service_info.validate())
    }

    /// Returns true when the service info was stored and listeners notified.
    #[instrument(skip_all, fields(key = %service_info.key()))]
    pub(crate) fn emit(&self, service_info: ServiceInfo) -> bool {
        if self.is_empty_or_error_push(&service_info) {
            warn!("empty or error push ignored, hosts={}", service_info.ip_count());
            return false;
        }

        let key = service_info.key();
        let _guard = self.process_lock.lock().unwrap_or_else(|e| e.into_inner());

        let old_service = self.cache.get(&key);
        if !Self::is_changed_service_info(old_service.as_ref(), &service_info) {
            return false;
        }

        info!(
            "current ips:({}) service: {} -> {}",
            service_info.ip_count(),
            key,
            service_info.hosts_to_json()
        );
        self.observer.notify(&key, &service_info);
        self.cache.insert(key, service_info);
        true
    }

    /// Stores the answer to a subscribe when nothing is cached for its key
    /// yet, without notifying. An empty answer is the known state then.
    pub(crate) fn seed(&self, service_info: ServiceInfo) -> bool {
        let key = service_info.key();
        let _guard = self.process_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.cache.get(&key).is_some() {
            return false;
        }
        debug!("seed {} with {} ips", key, service_info.ip_count());
        self.cache.insert(key, service_info);
        true
    }

    fn is_changed_service_info(old_service: Option<&ServiceInfo>, new_service: &ServiceInfo) -> bool {
        let Some(old_service) = old_service else {
            return true;
        };
        if is_outdated_data(old_service, new_service) {
            warn!(
                "out of date data received, old-t: {}, new-t: {}",
                old_service.last_ref_time, new_service.last_ref_time
            );
            return false;
        }

        let empty = Vec::new();
        let old_hosts = old_service.hosts.as_ref().unwrap_or(&empty);
        let new_hosts = new_service.hosts.as_ref().unwrap_or(&empty);
        let diff = ServiceInfoDiff::calculate(old_hosts, new_hosts);
        diff.log_changes(&new_service.key());
        diff.changed()
    }
}
