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

use dashmap::DashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::api::config::{ConfigChangeListener, NacosConfigResponse};
use crate::api::constants::{DEFAULT_CONTENT_TYPE, KEY_PARAM_APP_NAME, KEY_PARAM_CONTENT_TYPE};
use crate::api::error::{Error, Result};
use crate::api::plugin::AuthPlugin;
use crate::api::props::ClientOptions;
use crate::api::remote::{SessionState, Transport};
use crate::common::error::{handle_response, to_err_msg};
use crate::common::executor;
use crate::common::remote::handler::HandlerGuard;
use crate::common::remote::message::{MessageData, ResponseMessage};
use crate::common::remote::session::{self, Session, SessionShared};
use crate::config::cache::CacheData;
use crate::config::handler::ConfigChangeNotifyHandler;
use crate::config::message::request::*;
use crate::config::message::response::*;
use crate::config::util;

/// Interval of the batch listen that catches missed change notifications.
const LIST_ENSURE_INTERVAL: Duration = Duration::from_secs(60);

type ConfigCache = Arc<DashMap<String, CacheData>>;

/// Everything a config client does, on top of a shared session. Dropping it
/// stops the background tasks and releases its hold on the session.
pub(crate) struct ConfigWorker {
    session: Arc<Session>,
    cache: ConfigCache,
    notify_change_tx: UnboundedSender<String>,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
    _notify_handler: HandlerGuard,
}

/// Key of a listened config among the interests of the session.
fn interest_key(group_key: &str) -> String {
    format!("config#{group_key}")
}

impl ConfigWorker {
    pub(crate) async fn new(
        options: ClientOptions,
        transport: Option<Arc<dyn Transport>>,
        auth_plugin: Option<Arc<dyn AuthPlugin>>,
    ) -> Result<Self> {
        let session = session::acquire(options, transport, auth_plugin).await?;
        let request_timeout = Duration::from_millis(session.options().resolved_request_timeout_ms());
        let cache: ConfigCache = Arc::new(DashMap::new());

        // group_key: String
        let (notify_change_tx, notify_change_rx) = unbounded_channel();
        let notify_handler = session.handlers().register(
            ConfigChangeNotifyRequest::identity(),
            Arc::new(ConfigChangeNotifyHandler {
                notify_change_tx: notify_change_tx.clone(),
            }),
        );

        let shared = session.shared();
        let mut tasks = Vec::with_capacity(3);
        tasks.push(executor::spawn(
            Self::notify_change_to_cache_data(
                shared.clone(),
                cache.clone(),
                notify_change_rx,
                request_timeout,
            )
            .in_current_span(),
        ));

        let (list_shared, list_cache, list_tx) =
            (shared.clone(), cache.clone(), notify_change_tx.clone());
        tasks.push(executor::schedule_at_fixed_delay(
            move || {
                Some(Self::list_ensure_cache_data_newest(
                    list_shared.clone(),
                    list_cache.clone(),
                    list_tx.clone(),
                    request_timeout,
                ))
            },
            LIST_ENSURE_INTERVAL,
        ));

        tasks.push(executor::spawn(
            Self::listen_after_reconnect(shared, cache.clone(), notify_change_tx.clone(), request_timeout)
                .in_current_span(),
        ));

        Ok(ConfigWorker {
            session,
            cache,
            notify_change_tx,
            request_timeout,
            tasks,
            _notify_handler: notify_handler,
        })
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        self.session.options()
    }

    pub(crate) fn session_state(&self) -> SessionState {
        self.session.state()
    }

    fn namespace_or_default(&self, namespace: Option<&str>) -> String {
        namespace
            .unwrap_or_else(|| self.session.options().get_namespace())
            .to_owned()
    }
}

impl Drop for ConfigWorker {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }

        let unlisten: Vec<ConfigListenContext> = self
            .cache
            .iter()
            .filter(|c| self.session.interests().release(&interest_key(c.key())))
            .map(|c| {
                ConfigListenContext::new(
                    c.data_id.clone(),
                    c.group.clone(),
                    c.namespace.clone(),
                    c.md5.clone(),
                )
            })
            .collect();
        if !unlisten.is_empty() {
            executor::spawn(
                Self::batch_listen(
                    self.session.shared(),
                    unlisten,
                    false,
                    self.notify_change_tx.clone(),
                    self.request_timeout,
                )
                .in_current_span(),
            );
        }
        debug!("config worker closed, {} listened keys dropped", self.cache.len());
    }
}

impl ConfigWorker {
    #[instrument(skip_all, fields(data_id = data_id, group = group))]
    pub(crate) async fn get_config(
        &self,
        data_id: &str,
        group: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<NacosConfigResponse> {
        let group = util::check_key(data_id, group)?;
        let namespace = self.namespace_or_default(namespace);

        let resp = Self::get_config_inner(
            &self.session,
            data_id.to_owned(),
            group.clone(),
            namespace.clone(),
            timeout,
        )
        .await?;

        Ok(NacosConfigResponse::new(
            namespace,
            data_id.to_owned(),
            group,
            resp.content.unwrap_or_default(),
            resp.content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
            resp.md5.unwrap_or_default(),
        ))
    }

    #[instrument(skip_all, fields(data_id = data_id, group = group))]
    pub(crate) async fn publish_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        cas_md5: Option<&str>,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        let group = util::check_key(data_id, group)?;
        let namespace = self.namespace_or_default(namespace);

        let mut req = ConfigPublishRequest::new(data_id.to_owned(), group, namespace, content.to_owned())
            .cas_md5(cas_md5.map(str::to_owned));
        req.add_addition_param(KEY_PARAM_CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
        if let Some(app_name) = self.session.options().get_app_name() {
            req.add_addition_param(KEY_PARAM_APP_NAME, app_name);
        }

        let resp = self
            .session
            .send_request::<ConfigPublishRequest, ConfigPublishResponse>(req, timeout)
            .await?;
        handle_response(&resp, "publish_config").map(|_| true)
    }

    #[instrument(skip_all, fields(data_id = data_id, group = group))]
    pub(crate) async fn remove_config(
        &self,
        data_id: &str,
        group: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<bool> {
        let group = util::check_key(data_id, group)?;
        let namespace = self.namespace_or_default(namespace);

        let req = ConfigRemoveRequest::new(data_id.to_owned(), group, namespace);
        let resp = self
            .session
            .send_request::<ConfigRemoveRequest, ConfigRemoveResponse>(req, timeout)
            .await?;
        handle_response(&resp, "remove_config").map(|_| true)
    }

    /// Add listener.
    #[instrument(skip_all, fields(data_id = data_id, group = group))]
    pub(crate) async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
        timeout: Duration,
    ) -> Result<()> {
        let group = util::check_key(data_id, group)?;
        let namespace = self.namespace_or_default(None);
        let group_key = util::group_key(data_id, &group, &namespace);

        if !self.cache.contains_key(&group_key) {
            let mut cache_data = CacheData::new(data_id.to_owned(), group, namespace);

            // the listener only hears about changes after the current content
            match Self::get_config_inner(
                &self.session,
                cache_data.data_id.clone(),
                cache_data.group.clone(),
                cache_data.namespace.clone(),
                timeout,
            )
            .await
            {
                Ok(resp) => Self::fill_data(&mut cache_data, resp),
                Err(Error::NotFound(_)) => {}
                Err(e) => error!("add_listener, initial get_config err={e}"),
            }

            let context = ConfigListenContext::new(
                cache_data.data_id.clone(),
                cache_data.group.clone(),
                cache_data.namespace.clone(),
                cache_data.md5.clone(),
            );
            if let dashmap::mapref::entry::Entry::Vacant(entry) = self.cache.entry(group_key.clone()) {
                entry.insert(cache_data);
                self.session.interests().hold(&interest_key(&group_key));
                executor::spawn(
                    Self::batch_listen(
                        self.session.shared(),
                        vec![context],
                        true,
                        self.notify_change_tx.clone(),
                        timeout,
                    )
                    .in_current_span(),
                );
            }
        }

        if let Some(mut cache_data) = self.cache.get_mut(&group_key) {
            if cache_data.add_listener(listener) {
                info!("add listener of {}", group_key);
            }
        }
        Ok(())
    }

    /// Remove listener. The key stops being listened once it has none left.
    #[instrument(skip_all, fields(data_id = data_id, group = group))]
    pub(crate) async fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        listener: Arc<dyn ConfigChangeListener>,
        timeout: Duration,
    ) -> Result<()> {
        let group = util::check_key(data_id, group)?;
        let namespace = self.namespace_or_default(None);
        let group_key = util::group_key(data_id, &group, &namespace);

        if let Some(mut cache_data) = self.cache.get_mut(&group_key) {
            cache_data.remove_listener(&listener);
        }
        let Some((_, removed)) = self
            .cache
            .remove_if(&group_key, |_, cache_data| !cache_data.has_listeners())
        else {
            return Ok(());
        };

        if !self.session.interests().release(&interest_key(&group_key)) {
            info!("no listener of {} left, another client of the session still listens", group_key);
            return Ok(());
        }
        info!("stop listening {}", group_key);
        let context = ConfigListenContext::new(removed.data_id, removed.group, removed.namespace, removed.md5);
        executor::spawn(
            Self::batch_listen(
                self.session.shared(),
                vec![context],
                false,
                self.notify_change_tx.clone(),
                timeout,
            )
            .in_current_span(),
        );
        Ok(())
    }
}

impl ConfigWorker {
    async fn get_config_inner(
        session: &SessionShared,
        data_id: String,
        group: String,
        namespace: String,
        timeout: Duration,
    ) -> Result<ConfigQueryResponse> {
        let group_key = util::group_key(&data_id, &group, &namespace);
        let req = ConfigQueryRequest::new(data_id, group, namespace);
        let resp = session
            .send_request::<ConfigQueryRequest, ConfigQueryResponse>(req, timeout)
            .await?;

        if resp.is_success() {
            return Ok(resp);
        }
        if resp.is_not_found() {
            return Err(Error::NotFound(group_key));
        }
        let err_str = to_err_msg(&resp, "get_config");
        if resp.is_query_conflict() {
            warn!("config {} is being modified: {}", group_key, err_str);
        }
        Err(Error::ErrResult(err_str))
    }

    fn fill_data(cache_data: &mut CacheData, resp: ConfigQueryResponse) {
        cache_data.update(
            resp.content.unwrap_or_default(),
            resp.content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
            resp.md5.unwrap_or_default(),
            resp.last_modified,
        );
    }

    /// Fetches the newest content of `group_key` and notifies its listeners.
    async fn refresh(session: &SessionShared, cache: &ConfigCache, group_key: &str, timeout: Duration) {
        let Some((data_id, group, namespace)) = cache
            .get(group_key)
            .map(|c| (c.data_id.clone(), c.group.clone(), c.namespace.clone()))
        else {
            debug!("{} is not listened, skip refresh", group_key);
            return;
        };

        let ret = Self::get_config_inner(session, data_id, group, namespace, timeout).await;
        let Some(mut cache_data) = cache.get_mut(group_key) else {
            return;
        };
        match ret {
            Ok(resp) => Self::fill_data(&mut cache_data, resp),
            Err(Error::NotFound(_)) => {
                info!("{} was deleted", group_key);
                cache_data.update(String::new(), DEFAULT_CONTENT_TYPE.to_owned(), String::new(), 0);
            }
            Err(e) => {
                error!("refresh {} failed: {e}", group_key);
                return;
            }
        }
        cache_data.notify_listeners();
    }

    /// Applies changed keys one by one, so listeners see versions in order.
    async fn notify_change_to_cache_data(
        session: Arc<SessionShared>,
        cache: ConfigCache,
        mut notify_change_rx: UnboundedReceiver<String>,
        timeout: Duration,
    ) {
        while let Some(group_key) = notify_change_rx.recv().await {
            Self::refresh(&session, &cache, &group_key, timeout).await;
        }
        warn!("notify_change_to_cache_data break, notify_change_rx be dropped(shutdown).");
    }

    async fn batch_listen(
        session: Arc<SessionShared>,
        contexts: Vec<ConfigListenContext>,
        listen: bool,
        notify_change_tx: UnboundedSender<String>,
        timeout: Duration,
    ) {
        let req = ConfigBatchListenRequest::new(listen).config_listen_contexts(contexts);
        let resp = session
            .send_request::<ConfigBatchListenRequest, ConfigChangeBatchListenResponse>(req, timeout)
            .await;
        match resp {
            Ok(resp) if resp.is_success() => {
                for context in resp.changed_configs {
                    let group_key = util::group_key(&context.data_id, &context.group, &context.namespace);
                    debug!("server reports {} changed", group_key);
                    let _ = notify_change_tx.send(group_key);
                }
            }
            Ok(resp) => warn!("{}", to_err_msg(&resp, "batch_listen")),
            Err(e) => warn!("batch_listen failed: {e}"),
        }
    }

    /// List-Watch, list ensure cache-data newest.
    async fn list_ensure_cache_data_newest(
        session: Arc<SessionShared>,
        cache: ConfigCache,
        notify_change_tx: UnboundedSender<String>,
        timeout: Duration,
    ) {
        let contexts: Vec<ConfigListenContext> = cache
            .iter()
            .map(|c| {
                ConfigListenContext::new(
                    c.data_id.clone(),
                    c.group.clone(),
                    c.namespace.clone(),
                    c.md5.clone(),
                )
            })
            .collect();
        if contexts.is_empty() {
            return;
        }
        debug!("list_ensure_cache_data_newest, {} keys", contexts.len());
        Self::batch_listen(session, contexts, true, notify_change_tx, timeout).await;
    }

    /// Listens again with every cached md5 after each reconnect.
    async fn listen_after_reconnect(
        session: Arc<SessionShared>,
        cache: ConfigCache,
        notify_change_tx: UnboundedSender<String>,
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
            info!("session reconnected, listen {} config keys again", cache.len());
            Self::list_ensure_cache_data_newest(
                session.clone(),
                cache.clone(),
                notify_change_tx.clone(),
                timeout,
            )
            .await;
        }
    }
}
