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

//! One long-lived link per distinct [`ClientOptions`], shared by every client
//! built from equal options.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use futures::stream::BoxStream;
use futures::StreamExt;
use lazy_static::lazy_static;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::api::constants::{APP_FIELD, KEY_LABEL_APP_NAME, LABEL_MODULE, LABEL_SOURCE, LABEL_SOURCE_SDK};
use crate::api::error::{Error, Result};
use crate::api::plugin::{
    AuthContext, AuthPlugin, NoopAuthPlugin, PasswordAuthPlugin, PASSWORD, USERNAME,
};
use crate::api::props::ClientOptions;
use crate::api::remote::{registered_transport, Link, Payload, Requester, SessionState, Transport};
use crate::common::executor;
use crate::common::remote::backoff;
use crate::common::remote::handler::{ClientDetectionRequestHandler, HandlerGuard, HandlerRegistry};
use crate::common::remote::message::request::{
    ClientDetectionRequest, ConnectResetRequest, ConnectionSetupRequest, HealthCheckRequest,
    ServerCheckRequest,
};
use crate::common::remote::message::response::{
    ConnectResetResponse, ErrorResponse, HealthCheckResponse, ServerCheckResponse,
};
use crate::common::remote::message::{
    decode_push, reply_payload, Message, MessageBuilder, MessageData, RequestMessage,
    ResponseMessage,
};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// Pause before retrying a request whose link broke mid-flight.
const BROKEN_LINK_RETRY_DELAY: Duration = Duration::from_millis(50);

lazy_static! {
    static ref SESSIONS: Mutex<HashMap<ClientOptions, Weak<Session>>> = Mutex::new(HashMap::new());
}

/// Returns the live session for `options`, connecting a new one if none.
///
/// `transport` and `auth_plugin` only apply when a new session is created;
/// without a transport the one registered for the server address is used.
#[instrument(skip_all, fields(server_addr = options.get_server_addr(), namespace = options.get_namespace()))]
pub(crate) async fn acquire(
    options: ClientOptions,
    transport: Option<Arc<dyn Transport>>,
    auth_plugin: Option<Arc<dyn AuthPlugin>>,
) -> Result<Arc<Session>> {
    let mut sessions = SESSIONS.lock().await;
    sessions.retain(|_, session| session.strong_count() > 0);

    if let Some(session) = sessions.get(&options).and_then(Weak::upgrade) {
        debug!("reuse session, connection_id={:?}", session.connection_id());
        return Ok(session);
    }

    let transport = match transport {
        Some(transport) => transport,
        None => registered_transport(options.get_server_addr())?,
    };
    let auth_plugin = auth_plugin.unwrap_or_else(|| default_auth_plugin(&options));

    let session = Arc::new(Session::connect(options.clone(), transport, auth_plugin).await?);
    sessions.insert(options, Arc::downgrade(&session));
    Ok(session)
}

fn default_auth_plugin(options: &ClientOptions) -> Arc<dyn AuthPlugin> {
    if options.credentials().is_some() {
        Arc::new(PasswordAuthPlugin::default())
    } else {
        Arc::new(NoopAuthPlugin::default())
    }
}

/// Current state plus the number of successful connects so far. Workers
/// replay their registrations whenever `epoch` moves past the one they saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionStatus {
    pub(crate) state: SessionState,
    pub(crate) epoch: u64,
}

/// Server-side interests of the workers sharing one session, counted per key.
///
/// The server tracks listens and subscriptions per connection, so a key may
/// only be given up on the wire once no worker of the session holds it.
#[derive(Default)]
pub(crate) struct Interests {
    counts: std::sync::Mutex<HashMap<String, usize>>,
}

impl Interests {
    /// Returns true if no worker held `key` before.
    pub(crate) fn hold(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(key.to_owned()).or_default();
        *count += 1;
        *count == 1
    }

    /// Returns true if `key` is no longer held by any worker.
    pub(crate) fn release(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        match counts.get_mut(key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(key);
                true
            }
            None => {
                warn!("release {key:?} which is not held");
                true
            }
        }
    }
}

struct ActiveLink {
    connection_id: String,
    requester: Arc<dyn Requester>,
    client_stream: UnboundedSender<Payload>,
}

/// Owner handle of a session. Dropping the last one closes the link.
pub(crate) struct Session {
    shared: Arc<SessionShared>,
    run_task: JoinHandle<()>,
    _client_detection: HandlerGuard,
}

impl Deref for Session {
    type Target = SessionShared;

    fn deref(&self) -> &Self::Target {
        &self.shared
    }
}

impl Session {
    async fn connect(
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        auth_plugin: Arc<dyn AuthPlugin>,
    ) -> Result<Session> {
        let (status, _) = watch::channel(SessionStatus {
            state: SessionState::Connecting,
            epoch: 0,
        });
        let handlers = Arc::new(HandlerRegistry::default());
        let client_detection = handlers.register(
            ClientDetectionRequest::identity(),
            Arc::new(ClientDetectionRequestHandler),
        );

        let shared = Arc::new(SessionShared {
            options,
            transport,
            auth_plugin,
            status,
            link: RwLock::new(None),
            handlers,
            interests: Interests::default(),
        });

        info!("connecting");
        let server_stream = match shared.open_link().await {
            Ok(server_stream) => server_stream,
            Err(e) => {
                error!("connect failed: {e}");
                shared.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        let span = info_span!(
            "session",
            server_addr = shared.options.get_server_addr(),
            namespace = shared.options.get_namespace()
        );
        let run_task = executor::spawn(shared.clone().run(server_stream).instrument(span));

        Ok(Session {
            shared,
            run_task,
            _client_detection: client_detection,
        })
    }

    /// Handle kept by background tasks; it does not keep the session alive.
    pub(crate) fn shared(&self) -> Arc<SessionShared> {
        self.shared.clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.run_task.abort();
        self.shared.take_link();
        self.shared.set_state(SessionState::Disconnected);
        info!(
            server_addr = self.shared.options.get_server_addr(),
            "session closed"
        );
    }
}

pub(crate) struct SessionShared {
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    auth_plugin: Arc<dyn AuthPlugin>,
    status: watch::Sender<SessionStatus>,
    link: RwLock<Option<Arc<ActiveLink>>>,
    handlers: Arc<HandlerRegistry>,
    interests: Interests,
}

impl SessionShared {
    pub(crate) fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub(crate) fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub(crate) fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub(crate) fn interests(&self) -> &Interests {
        &self.interests
    }

    pub(crate) fn connection_id(&self) -> Option<String> {
        self.current_link().map(|link| link.connection_id.clone())
    }

    fn current_link(&self) -> Option<Arc<ActiveLink>> {
        self.link
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn take_link(&self) -> Option<Arc<ActiveLink>> {
        self.link
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn set_state(&self, state: SessionState) {
        self.status.send_modify(|status| {
            if state == SessionState::Connected {
                status.epoch += 1;
            }
            status.state = state;
        });
    }

    fn auth_context(&self) -> AuthContext {
        let context = AuthContext::default().add_param("server_addr", self.options.get_server_addr());
        match self.options.credentials() {
            Some((username, password)) => context
                .add_param(USERNAME, username)
                .add_param(PASSWORD, password),
            None => context,
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.options.resolved_request_timeout_ms())
    }

    /// Opens a link, checks the server, sends the setup message and logs in.
    /// On success the link is installed and the state becomes `Connected`.
    async fn open_link(&self) -> Result<BoxStream<'static, Payload>> {
        let connect_timeout = self.connect_timeout();
        let connect = async {
            let Link {
                requester,
                server_stream,
                client_stream,
            } = self.transport.open(&self.options).await?;

            let check = MessageBuilder::new(ServerCheckRequest::new())
                .build()
                .into_payload()?;
            let response = requester.request(check).await?;
            let connection_id = decode_response::<ServerCheckResponse>(response)?
                .connection_id
                .ok_or_else(|| Error::Connection("server check returns no connection id".to_string()))?;

            let mut labels = HashMap::new();
            labels.insert(LABEL_SOURCE.to_owned(), LABEL_SOURCE_SDK.to_owned());
            labels.insert(LABEL_MODULE.to_owned(), "config,naming".to_owned());
            labels.insert(KEY_LABEL_APP_NAME.to_owned(), self.options.app_name_or_unknown());
            let setup = ConnectionSetupRequest {
                client_version: self.options.client_version(),
                tenant: self.options.get_namespace().to_owned(),
                labels,
                ..Default::default()
            };
            client_stream
                .unbounded_send(MessageBuilder::new(setup).build().into_payload()?)
                .map_err(|_| Error::Connection("link closed during setup".to_string()))?;

            self.auth_plugin
                .login(requester.as_ref(), self.auth_context())
                .await?;

            Ok::<_, Error>((
                ActiveLink {
                    connection_id,
                    requester,
                    client_stream,
                },
                server_stream,
            ))
        };

        let (link, server_stream) = timeout(connect_timeout, connect)
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "connect to {} timed out after {}ms",
                    self.options.get_server_addr(),
                    connect_timeout.as_millis()
                ))
            })??;

        info!("connected, connection_id={}", link.connection_id);
        *self
            .link
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(link));
        self.set_state(SessionState::Connected);
        Ok(server_stream)
    }

    async fn run(self: Arc<Self>, mut server_stream: BoxStream<'static, Payload>) {
        loop {
            self.serve(server_stream).await;

            self.take_link();
            self.set_state(SessionState::Reconnecting);
            warn!("link lost, reconnecting");

            let mut retry_count = 0u32;
            server_stream = loop {
                let delay = backoff(retry_count);
                debug!("reconnect attempt {} in {}ms", retry_count + 1, delay.as_millis());
                sleep(delay).await;

                match self.open_link().await {
                    Ok(server_stream) => break server_stream,
                    Err(e) => {
                        warn!("reconnect attempt {} failed: {e}", retry_count + 1);
                        retry_count = retry_count.saturating_add(1);
                    }
                }
            };
            info!("reconnected after {} failed attempts", retry_count);
        }
    }

    /// Handles pushes and health checks until the link is lost.
    async fn serve(&self, mut server_stream: BoxStream<'static, Payload>) {
        let mut health = interval(HEALTH_CHECK_INTERVAL);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        health.tick().await;

        loop {
            tokio::select! {
                push = server_stream.next() => {
                    let Some(push) = push else {
                        warn!("server stream closed");
                        return;
                    };
                    debug!("server push, type={}", push.message_type());

                    if push.message_type() == ConnectResetRequest::identity() {
                        let request_id = decode_push::<ConnectResetRequest>(push)
                            .and_then(|request| request.request_id().cloned());
                        if let Some(reply) = reply_payload(ConnectResetResponse::ok(), request_id.as_ref()) {
                            self.reply(reply);
                        }
                        info!("server asks to reset the connection");
                        return;
                    }

                    if let Some(reply) = self.handlers.dispatch(push).await {
                        self.reply(reply);
                    }
                }
                _ = health.tick() => {
                    if let Err(e) = self.health_check().await {
                        warn!("health check failed: {e}");
                        return;
                    }
                }
            }
        }
    }

    fn reply(&self, payload: Payload) {
        match self.current_link() {
            Some(link) => {
                if link.client_stream.unbounded_send(payload).is_err() {
                    warn!("client stream closed, reply dropped");
                }
            }
            None => warn!("no active link, reply dropped"),
        }
    }

    async fn health_check(&self) -> Result<()> {
        let link = self
            .current_link()
            .ok_or_else(|| Error::Connection("no active link".to_string()))?;
        let request = MessageBuilder::new(HealthCheckRequest::new())
            .build()
            .into_payload()?;
        let response = timeout(self.connect_timeout(), link.requester.request(request))
            .await
            .map_err(|_| Error::Timeout(self.connect_timeout().as_millis() as u64))??;
        decode_response::<HealthCheckResponse>(response)?;
        Ok(())
    }

    async fn wait_connected(&self, deadline: Instant) -> Result<Arc<ActiveLink>> {
        let mut status = self.status.subscribe();
        loop {
            let state = status.borrow_and_update().state;
            match state {
                SessionState::Connected => {
                    if let Some(link) = self.current_link() {
                        return Ok(link);
                    }
                }
                SessionState::Disconnected => {
                    return Err(Error::ClientShutdown("session is closed".to_string()))
                }
                SessionState::Connecting | SessionState::Reconnecting => {}
            }

            match timeout_at(deadline, status.changed()).await {
                Err(_) => {
                    return Err(Error::Connection(format!(
                        "not connected to {}",
                        self.options.get_server_addr()
                    )))
                }
                Ok(Err(_)) => return Err(Error::ClientShutdown("session is closed".to_string())),
                Ok(Ok(())) => {}
            }
        }
    }

    /// Sends `request` and decodes the reply, within `request_timeout`.
    ///
    /// Waits for the session while it reconnects. A request whose link broke
    /// is retried on the next link until the deadline. An auth rejection
    /// triggers one fresh login and one retry.
    pub(crate) async fn send_request<Req, Resp>(
        &self,
        request: Req,
        request_timeout: Duration,
    ) -> Result<Resp>
    where
        Req: RequestMessage + 'static,
        Resp: ResponseMessage + 'static,
    {
        let deadline = Instant::now() + request_timeout;
        let timeout_ms = request_timeout.as_millis() as u64;
        let mut relogin = true;

        loop {
            let link = self.wait_connected(deadline).await?;

            let mut request = request.clone();
            let headers = request.take_headers();
            let payload = MessageBuilder::new(request)
                .header(APP_FIELD, self.options.app_name_or_unknown())
                .headers(headers)
                .headers(self.auth_plugin.get_login_identity().contexts)
                .build()
                .into_payload()?;

            let response = match timeout_at(deadline, link.requester.request(payload)).await {
                Err(_) => return Err(Error::Timeout(timeout_ms)),
                Ok(Err(Error::Connection(msg))) => {
                    if Instant::now() + BROKEN_LINK_RETRY_DELAY >= deadline {
                        return Err(Error::Connection(msg));
                    }
                    debug!("link broken during {}: {msg}, retry", Req::identity());
                    sleep(BROKEN_LINK_RETRY_DELAY).await;
                    continue;
                }
                Ok(ret) => ret?,
            };

            match decode_response::<Resp>(response) {
                Err(Error::Auth(msg)) if relogin => {
                    relogin = false;
                    warn!("request {} rejected: {msg}, login again", Req::identity());
                    timeout_at(
                        deadline,
                        self.auth_plugin
                            .login(link.requester.as_ref(), self.auth_context()),
                    )
                    .await
                    .map_err(|_| Error::Timeout(timeout_ms))??;
                }
                ret => return ret,
            }
        }
    }
}

fn decode_response<Resp: ResponseMessage>(response: Payload) -> Result<Resp> {
    if response.message_type() == ErrorResponse::identity() {
        let error = Message::<ErrorResponse>::from_payload(response)?.into_body();
        let message = error.message().cloned().unwrap_or_default();
        if error.is_auth_failure() {
            return Err(Error::Auth(message));
        }
        return Err(Error::ErrResult(format!(
            "error_code={}, message={}",
            error.error_code(),
            message
        )));
    }
    Ok(Message::<Resp>::from_payload(response)?.into_body())
}
