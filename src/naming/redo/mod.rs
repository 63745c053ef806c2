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
use std::sync::Mutex;

use crate::api::naming::NacosServiceInstance;

/// Instances registered by this client for one service.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InstanceRedo {
    pub(crate) service_name: String,
    pub(crate) group_name: String,
    pub(crate) instances: Vec<NacosServiceInstance>,
}

/// One server subscription of this client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SubscribeRedo {
    pub(crate) service_name: String,
    pub(crate) group_name: String,
    pub(crate) clusters: String,
}

/// What has to be sent again once a new link is up, keyed by service key.
#[derive(Default)]
pub(crate) struct RedoData {
    instances: Mutex<HashMap<String, InstanceRedo>>,
    subscribes: Mutex<HashMap<String, SubscribeRedo>>,
}

impl RedoData {
    /// Adds the instances of a service, replacing any with the same endpoint.
    pub(crate) fn cache_instances(
        &self,
        key: String,
        service_name: &str,
        group_name: &str,
        instances: Vec<NacosServiceInstance>,
    ) {
        let mut map = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        let redo = map.entry(key).or_insert_with(|| InstanceRedo {
            service_name: service_name.to_owned(),
            group_name: group_name.to_owned(),
            instances: Vec::new(),
        });
        for instance in instances {
            redo.instances.retain(|cached| !cached.is_same_endpoint(&instance));
            redo.instances.push(instance);
        }
    }

    pub(crate) fn remove_instance(&self, key: &str, instance: &NacosServiceInstance) {
        let mut map = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(redo) = map.get_mut(key) {
            redo.instances.retain(|cached| !cached.is_same_endpoint(instance));
            if redo.instances.is_empty() {
                map.remove(key);
            }
        }
    }

    pub(crate) fn instances(&self) -> Vec<InstanceRedo> {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Returns false if the key was already subscribed.
    pub(crate) fn cache_subscribe(&self, key: String, redo: SubscribeRedo) -> bool {
        self.subscribes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, redo)
            .is_none()
    }

    pub(crate) fn is_subscribed(&self, key: &str) -> bool {
        self.subscribes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub(crate) fn remove_subscribe(&self, key: &str) -> Option<SubscribeRedo> {
        self.subscribes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    pub(crate) fn drain_subscribes(&self) -> Vec<(String, SubscribeRedo)> {
        self.subscribes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect()
    }

    pub(crate) fn subscribes(&self) -> Vec<SubscribeRedo> {
        self.subscribes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}
