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

use std::{borrow::Cow, collections::HashMap, marker::PhantomData, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, info_span, Instrument};

use crate::api::constants::ENV_NACOS_CLIENT_CACHE_DIR;
use crate::common::cache::disk::DiskStore;
use crate::properties::get_value_option;

use super::executor;

mod disk;

/// In-memory map, mirrored to a [`Store`] when one is configured.
pub(crate) struct Cache<V> {
    inner: Arc<DashMap<String, V>>,
    store: Option<Arc<dyn Store<V>>>,
}

impl<V> Cache<V>
where
    V: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    fn new(id: &str, store: Option<Arc<dyn Store<V>>>, load_cache_at_start: bool) -> Self {
        let _span_enter = info_span!("cache", id = id).entered();

        let inner = DashMap::new();
        match &store {
            Some(store) if load_cache_at_start => {
                info!("Loading cache by {}", store.name());
                for (k, v) in store.load() {
                    inner.insert(k, v);
                }
            }
            Some(store) => info!("Skip loading cache by {}", store.name()),
            None => info!("Creating memory-only cache"),
        }

        Self {
            inner: Arc::new(inner),
            store,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert(&self, key: String, value: V) -> Option<V> {
        if let Some(store) = self.store.clone() {
            match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    let key = key.clone();
                    executor::spawn(async move { store.save(&key, bytes).await }.in_current_span());
                }
                Err(e) => tracing::warn!("cache value of {key} cannot be serialized: {e}"),
            }
        }

        self.inner.insert(key, value)
    }

    pub(crate) fn remove(&self, key: &str) -> Option<V> {
        let (key, value) = self.inner.remove(key)?;

        if let Some(store) = self.store.clone() {
            executor::spawn(async move { store.remove(&key).await }.in_current_span());
        }

        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

pub(crate) struct CacheBuilder<V> {
    _mark: PhantomData<V>,
    namespace: String,
    module: String,
    load_cache_at_start: bool,
    store: Option<Arc<dyn Store<V>>>,
}

const NAMING_MODULE: &str = "naming";

impl<V> CacheBuilder<V>
where
    V: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn naming(namespace: String) -> Self {
        Self {
            _mark: PhantomData,
            namespace,
            module: NAMING_MODULE.to_owned(),
            load_cache_at_start: false,
            store: None,
        }
    }

    pub(crate) fn load_cache_at_start(self, load_cache_at_start: bool) -> Self {
        Self {
            load_cache_at_start,
            ..self
        }
    }

    /// Persist under `${NACOS_CLIENT_CACHE_DIR:-$HOME/nacos}/<module>/<namespace>`.
    pub(crate) fn disk_store(self) -> Self {
        let root = get_value_option(ENV_NACOS_CLIENT_CACHE_DIR)
            .map(PathBuf::from)
            .or_else(|| home::home_dir().map(|home| home.join("nacos")))
            .unwrap_or_else(|| std::env::temp_dir().join("nacos"));
        self.disk_store_at(root)
    }

    pub(crate) fn disk_store_at(self, root: PathBuf) -> Self {
        let namespace = if self.namespace.is_empty() {
            "public".to_owned()
        } else {
            self.namespace.clone()
        };
        let disk_path = root.join(&self.module).join(namespace);

        Self {
            store: Some(Arc::new(DiskStore::new(disk_path))),
            ..self
        }
    }

    pub(crate) fn build(self, id: String) -> Cache<V> {
        Cache::new(&id, self.store, self.load_cache_at_start)
    }
}

#[async_trait]
trait Store<V>: Send + Sync {
    fn name(&self) -> Cow<'_, str>;

    fn load(&self) -> HashMap<String, V>;

    async fn save(&self, key: &str, value: Vec<u8>);

    async fn remove(&self, key: &str);
}
