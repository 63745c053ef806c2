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

use tracing::info;

use crate::api::config::{ConfigChangeListener, NacosConfigResponse};
use crate::common::dispatch::Dispatcher;

/// Cache Data for a listened config key.
pub(crate) struct CacheData {
    pub(crate) data_id: String,
    pub(crate) group: String,
    pub(crate) namespace: String,
    /// Default text; text, json, properties, html, xml, yaml ...
    pub(crate) content_type: String,
    pub(crate) content: String,
    /// Empty while the key does not exist on the server.
    pub(crate) md5: String,
    pub(crate) last_modified: i64,

    listeners: Vec<ListenerWrapper>,
}

impl CacheData {
    pub(crate) fn new(data_id: String, group: String, namespace: String) -> Self {
        Self {
            data_id,
            group,
            namespace,
            content_type: crate::api::constants::DEFAULT_CONTENT_TYPE.to_owned(),
            content: String::new(),
            md5: String::new(),
            last_modified: 0,
            listeners: Vec::new(),
        }
    }

    /// Adds a listener, returns false if it was already present. It will only
    /// hear about md5 values other than the current one.
    pub(crate) fn add_listener(&mut self, listener: Arc<dyn ConfigChangeListener>) -> bool {
        if self.index_of_listener(&listener).is_some() {
            return false;
        }
        self.listeners
            .push(ListenerWrapper::new(listener, self.md5.clone(), self.to_string()));
        true
    }

    /// Removes a listener, returns false if it was not present.
    pub(crate) fn remove_listener(&mut self, listener: &Arc<dyn ConfigChangeListener>) -> bool {
        match self.index_of_listener(listener) {
            Some(idx) => {
                self.listeners.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    fn index_of_listener(&self, listener: &Arc<dyn ConfigChangeListener>) -> Option<usize> {
        let target = Arc::as_ptr(listener) as *const ();
        self.listeners
            .iter()
            .position(|wrapper| Arc::as_ptr(&wrapper.listener) as *const () == target)
    }

    /// Replaces the content. An absent key is stored as empty content and md5.
    pub(crate) fn update(&mut self, content: String, content_type: String, md5: String, last_modified: i64) {
        self.content = content;
        self.content_type = content_type;
        self.md5 = md5;
        self.last_modified = last_modified;
    }

    pub(crate) fn to_response(&self) -> NacosConfigResponse {
        NacosConfigResponse::new(
            self.namespace.clone(),
            self.data_id.clone(),
            self.group.clone(),
            self.content.clone(),
            self.content_type.clone(),
            self.md5.clone(),
        )
    }

    /// Hands the current snapshot to every listener that has not seen this md5.
    pub(crate) fn notify_listeners(&mut self) -> usize {
        let response = self.to_response();
        let mut notified = 0;
        for wrapper in self.listeners.iter_mut() {
            if wrapper.last_md5 == self.md5 {
                continue;
            }
            wrapper.last_md5 = self.md5.clone();
            if wrapper.dispatcher.dispatch(response.clone()) {
                notified += 1;
            }
        }
        if notified > 0 {
            info!("notify {} listeners of {}", notified, self);
        }
        notified
    }
}

impl std::fmt::Display for CacheData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CacheData(namespace={n},data_id={d},group={g},md5={m},content_type={t})",
            n = self.namespace,
            d = self.data_id,
            g = self.group,
            m = self.md5,
            t = self.content_type,
        )
    }
}

struct ListenerWrapper {
    /// last md5 handed to the listener
    last_md5: String,
    listener: Arc<dyn ConfigChangeListener>,
    dispatcher: Dispatcher<NacosConfigResponse>,
}

impl ListenerWrapper {
    fn new(listener: Arc<dyn ConfigChangeListener>, last_md5: String, name: String) -> Self {
        let callback = listener.clone();
        let dispatcher = Dispatcher::new(
            name,
            Arc::new(move |response: NacosConfigResponse| callback.on_change(response)),
        );
        Self {
            last_md5,
            listener,
            dispatcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<NacosConfigResponse>>,
    }

    impl ConfigChangeListener for Recorder {
        fn on_change(&self, config: NacosConfigResponse) {
            self.seen.lock().unwrap().push(config);
        }
    }

    fn wait_for(recorder: &Recorder, count: usize) {
        for _ in 0..100 {
            if recorder.seen.lock().unwrap().len() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn cache_data() -> CacheData {
        CacheData::new("todo-dataid".to_string(), "LOVE".to_string(), String::new())
    }

    #[test]
    fn test_cache_data_add_listener() {
        let mut cache_data = cache_data();

        let lis1: Arc<dyn ConfigChangeListener> = Arc::new(Recorder::default());
        let lis2: Arc<dyn ConfigChangeListener> = Arc::new(Recorder::default());
        assert!(cache_data.add_listener(lis1));
        assert!(cache_data.add_listener(lis2.clone()));
        assert!(!cache_data.add_listener(lis2.clone()));
        assert_eq!(cache_data.listeners.len(), 2);

        assert!(cache_data.remove_listener(&lis2));
        assert!(!cache_data.remove_listener(&lis2));
        assert!(cache_data.has_listeners());
    }

    #[test]
    fn test_notify_each_md5_once() {
        let mut cache_data = cache_data();
        cache_data.update("v0".to_string(), "text".to_string(), "md5-0".to_string(), 1);

        let recorder = Arc::new(Recorder::default());
        cache_data.add_listener(recorder.clone());
        assert_eq!(cache_data.notify_listeners(), 0);

        cache_data.update("v1".to_string(), "text".to_string(), "md5-1".to_string(), 2);
        assert_eq!(cache_data.notify_listeners(), 1);
        assert_eq!(cache_data.notify_listeners(), 0);

        cache_data.update(String::new(), "text".to_string(), String::new(), 3);
        assert_eq!(cache_data.notify_listeners(), 1);

        wait_for(&recorder, 2);
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].content(), "v1");
        assert_eq!(seen[0].md5(), "md5-1");
        assert_eq!(seen[1].content(), "");
        assert_eq!(seen[1].md5(), "");
    }
}
