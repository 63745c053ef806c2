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

use tracing::info;

use crate::api::naming::NacosServiceInstance;
use crate::naming::dto::ServiceInfo;

/// Represents the difference between two service info snapshots
#[derive(Debug, Clone, Default)]
pub(crate) struct ServiceInfoDiff<'a> {
    pub(crate) new_instances: Vec<&'a NacosServiceInstance>,
    pub(crate) removed_instances: Vec<&'a NacosServiceInstance>,
    pub(crate) modified_instances: Vec<&'a NacosServiceInstance>,
}

fn endpoint_key(host: &NacosServiceInstance) -> String {
    format!("{}#{}", host.ip_and_port(), host.cluster_name)
}

impl<'a> ServiceInfoDiff<'a> {
    /// Calculate the difference between old and new service hosts
    pub(crate) fn calculate(old_hosts: &'a [NacosServiceInstance], new_hosts: &'a [NacosServiceInstance]) -> Self {
        let old_hosts_map: HashMap<String, &NacosServiceInstance> =
            old_hosts.iter().map(|host| (endpoint_key(host), host)).collect();
        let new_hosts_map: HashMap<String, &NacosServiceInstance> =
            new_hosts.iter().map(|host| (endpoint_key(host), host)).collect();

        let mut diff = Self::default();
        for (key, new_host) in new_hosts_map.iter() {
            match old_hosts_map.get(key) {
                None => diff.new_instances.push(*new_host),
                Some(old_host) if old_host != new_host => diff.modified_instances.push(*new_host),
                Some(_) => {}
            }
        }
        for (key, old_host) in old_hosts_map.iter() {
            if !new_hosts_map.contains_key(key) {
                diff.removed_instances.push(*old_host);
            }
        }
        diff
    }

    pub(crate) fn changed(&self) -> bool {
        !self.new_instances.is_empty()
            || !self.removed_instances.is_empty()
            || !self.modified_instances.is_empty()
    }

    pub(crate) fn log_changes(&self, key: &str) {
        let groups = [
            ("new", &self.new_instances),
            ("removed", &self.removed_instances),
            ("modified", &self.modified_instances),
        ];
        for (kind, instances) in groups {
            if instances.is_empty() {
                continue;
            }
            let json = serde_json::to_string(instances).unwrap_or_else(|_| "[]".to_owned());
            info!("{} ips({}) service: {} -> {}", kind, instances.len(), key, json);
        }
    }
}

/// Check if the new service info is outdated compared to cached data
pub(crate) fn is_outdated_data(old_service: &ServiceInfo, new_service: &ServiceInfo) -> bool {
    old_service.last_ref_time > new_service.last_ref_time
}
