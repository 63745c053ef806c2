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

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::api::constants::SERVICE_INFO_SPLITER;
use crate::api::naming::NacosServiceInstance;

/// Instance list of a (group, service, clusters) as the server sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ServiceInfo {
    pub(crate) name: String,

    pub(crate) group_name: String,

    pub(crate) clusters: String,

    pub(crate) cache_millis: i64,

    pub(crate) last_ref_time: i64,

    pub(crate) checksum: String,

    #[serde(rename = "allIPs")]
    pub(crate) all_ips: bool,

    pub(crate) reach_protection_threshold: bool,

    pub(crate) hosts: Option<Vec<NacosServiceInstance>>,
}

impl ServiceInfo {
    pub(crate) fn ip_count(&self) -> usize {
        self.hosts.as_ref().map_or(0, Vec::len)
    }

    /// Whether at least one host can take traffic.
    pub(crate) fn validate(&self) -> bool {
        if self.all_ips {
            return true;
        }

        self.hosts
            .as_ref()
            .is_some_and(|hosts| hosts.iter().any(|host| host.healthy && host.weight > 0.0))
    }

    /// group@@service
    pub(crate) fn get_grouped_service_name(service_name: &str, group_name: &str) -> String {
        if !group_name.is_empty() && !service_name.contains(SERVICE_INFO_SPLITER) {
            return format!("{group_name}{SERVICE_INFO_SPLITER}{service_name}");
        }
        service_name.to_string()
    }

    /// group@@service[@@clusters]
    pub(crate) fn get_key(grouped_name: &str, clusters: &str) -> String {
        if !clusters.is_empty() {
            return format!("{grouped_name}{SERVICE_INFO_SPLITER}{clusters}");
        }
        grouped_name.to_string()
    }

    pub(crate) fn key(&self) -> String {
        Self::get_key(
            &Self::get_grouped_service_name(&self.name, &self.group_name),
            &self.clusters,
        )
    }

    pub(crate) fn hosts_to_json(&self) -> String {
        let Some(hosts) = self.hosts.as_ref() else {
            return String::new();
        };
        serde_json::to_string(hosts).unwrap_or_else(|e| {
            error!("hosts to json failed. {e:?}");
            String::new()
        })
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: Default::default(),
            group_name: Default::default(),
            clusters: Default::default(),
            cache_millis: 1000,
            last_ref_time: 0,
            checksum: Default::default(),
            all_ips: false,
            reach_protection_threshold: false,
            hosts: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key() {
        let grouped = ServiceInfo::get_grouped_service_name("todo-service", "LOVE");
        assert_eq!(grouped, "LOVE@@todo-service");
        assert_eq!(ServiceInfo::get_key(&grouped, ""), "LOVE@@todo-service");
        assert_eq!(ServiceInfo::get_key(&grouped, "c1,c2"), "LOVE@@todo-service@@c1,c2");
        assert_eq!(
            ServiceInfo::get_grouped_service_name("LOVE@@todo-service", "OTHER"),
            "LOVE@@todo-service"
        );
    }

    #[test]
    fn test_validate() {
        let mut service_info = ServiceInfo::default();
        assert!(!service_info.validate());

        service_info.hosts = Some(vec![NacosServiceInstance::new("127.0.0.1", 80).healthy(false)]);
        assert!(!service_info.validate());

        service_info.hosts = Some(vec![NacosServiceInstance::new("127.0.0.1", 80).weight(0.0)]);
        assert!(!service_info.validate());

        service_info.hosts = Some(vec![NacosServiceInstance::new("127.0.0.1", 80)]);
        assert!(service_info.validate());

        service_info.hosts = Some(Vec::new());
        service_info.all_ips = true;
        assert!(service_info.validate());
    }

    #[test]
    fn test_server_json() {
        let json = r#"{"name":"todo-service","groupName":"LOVE","clusters":"","lastRefTime":5,"allIPs":false,"hosts":[{"ip":"1.1.1.1","port":8080}]}"#;
        let service_info: ServiceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(service_info.key(), "LOVE@@todo-service");
        assert_eq!(service_info.ip_count(), 1);
        assert_eq!(service_info.last_ref_time, 5);
        assert_eq!(service_info.cache_millis, 1000);
    }
}
