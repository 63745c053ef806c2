#![allow(dead_code)]

//! In-memory server double speaking the message set the clients use.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use md5::{Digest, Md5};
use serde_json::{json, Value};

use nacos_binding::api::error::{Error, Result};
use nacos_binding::api::props::ClientOptions;
use nacos_binding::api::remote::{Link, Payload, Requester, Transport};

static LOGGER_INIT: Once = Once::new();

pub fn setup_log() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_thread_names(true)
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Options with a server address of its own, so tests never share a session.
pub fn options(test_name: &str) -> ClientOptions {
    ClientOptions::new(format!("mock-{test_name}:8848"), "")
        .app_name("todo-your-app-name")
        .request_timeout_ms(1000)
}

pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub fn wait_until_blocking(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    check()
}

pub fn md5_hex(content: &str) -> String {
    format!("{:x}", Md5::digest(content.as_bytes()))
}

/// (namespace, group, service)
type ServiceKey = (String, String, String);

/// (tenant, group, data_id)
type ConfigKey = (String, String, String);

struct StoredConfig {
    content: String,
    md5: String,
    last_modified: i64,
}

struct StoredInstance {
    owner: String,
    instance: Value,
}

struct Subscriber {
    connection_id: String,
    clusters: String,
}

struct ServerState {
    accepting: bool,
    opened: usize,
    links: HashMap<String, mpsc::UnboundedSender<Payload>>,
    client_sides: Vec<mpsc::UnboundedReceiver<Payload>>,
    credentials: Option<(String, String)>,
    tokens: HashSet<String>,
    delays: HashMap<String, Duration>,
    requests: HashMap<String, usize>,
    pushes: HashMap<String, usize>,
    configs: HashMap<ConfigKey, StoredConfig>,
    config_listeners: HashMap<ConfigKey, HashSet<String>>,
    services: HashMap<ServiceKey, Vec<StoredInstance>>,
    subscribers: HashMap<ServiceKey, Vec<Subscriber>>,
}

pub struct MockNacosServer {
    state: Arc<Mutex<ServerState>>,
}

static REF_TIME: AtomicI64 = AtomicI64::new(1);

fn next_ref_time() -> i64 {
    REF_TIME.fetch_add(1, Ordering::SeqCst)
}

fn lock(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn ok(kind: &str, mut body: Value) -> (String, Value) {
    body["resultCode"] = json!(200);
    body["errorCode"] = json!(0);
    (kind.to_string(), body)
}

fn fail(kind: &str, error_code: i32, message: &str) -> (String, Value) {
    (
        kind.to_string(),
        json!({"resultCode": 500, "errorCode": error_code, "message": message}),
    )
}

fn text(value: &Value, field: &str) -> String {
    value[field].as_str().unwrap_or_default().to_string()
}

fn same_endpoint(a: &Value, b: &Value) -> bool {
    a["ip"] == b["ip"] && a["port"] == b["port"] && a["clusterName"] == b["clusterName"]
}

impl MockNacosServer {
    pub fn new() -> Arc<Self> {
        Arc::new(MockNacosServer {
            state: Arc::new(Mutex::new(ServerState {
                accepting: true,
                opened: 0,
                links: HashMap::new(),
                client_sides: Vec::new(),
                credentials: None,
                tokens: HashSet::new(),
                delays: HashMap::new(),
                requests: HashMap::new(),
                pushes: HashMap::new(),
                configs: HashMap::new(),
                config_listeners: HashMap::new(),
                services: HashMap::new(),
                subscribers: HashMap::new(),
            })),
        })
    }

    pub fn with_credentials(username: &str, password: &str) -> Arc<Self> {
        let server = Self::new();
        lock(&server.state).credentials = Some((username.to_string(), password.to_string()));
        server
    }

    /// Links opened so far.
    pub fn opened(&self) -> usize {
        lock(&self.state).opened
    }

    pub fn live_links(&self) -> usize {
        lock(&self.state).links.len()
    }

    /// Ends every link. Ephemeral instances, listens and subscriptions of
    /// those links are dropped, like a server losing its clients.
    pub fn kill_links(&self) {
        let mut state = lock(&self.state);
        let killed: HashSet<String> = state.links.drain().map(|(id, _)| id).collect();
        for instances in state.services.values_mut() {
            instances.retain(|stored| !killed.contains(&stored.owner));
        }
        for subscribers in state.subscribers.values_mut() {
            subscribers.retain(|subscriber| !killed.contains(&subscriber.connection_id));
        }
        for listeners in state.config_listeners.values_mut() {
            listeners.retain(|connection_id| !killed.contains(connection_id));
        }
    }

    pub fn set_accepting(&self, accepting: bool) {
        lock(&self.state).accepting = accepting;
    }

    pub fn set_delay(&self, message_type: &str, delay: Duration) {
        lock(&self.state).delays.insert(message_type.to_string(), delay);
    }

    pub fn request_count(&self, message_type: &str) -> usize {
        lock(&self.state).requests.get(message_type).copied().unwrap_or(0)
    }

    pub fn push_count(&self, message_type: &str) -> usize {
        lock(&self.state).pushes.get(message_type).copied().unwrap_or(0)
    }

    /// Publishes from the server side, notifying the listening links.
    pub fn put_config(&self, data_id: &str, group: &str, content: &str) {
        let mut state = lock(&self.state);
        state.store_config(data_id, group, "", content);
    }

    pub fn config_md5(&self, data_id: &str, group: &str) -> Option<String> {
        lock(&self.state)
            .configs
            .get(&(String::new(), group.to_string(), data_id.to_string()))
            .map(|stored| stored.md5.clone())
    }

    /// Connections listening to the config.
    pub fn config_listener_count(&self, data_id: &str, group: &str) -> usize {
        lock(&self.state)
            .config_listeners
            .get(&(String::new(), group.to_string(), data_id.to_string()))
            .map_or(0, HashSet::len)
    }

    pub fn instances(&self, group: &str, service: &str) -> Vec<Value> {
        lock(&self.state)
            .services
            .get(&(String::new(), group.to_string(), service.to_string()))
            .map(|stored| stored.iter().map(|s| s.instance.clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, group: &str, service: &str) -> usize {
        lock(&self.state)
            .subscribers
            .get(&(String::new(), group.to_string(), service.to_string()))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Transport for MockNacosServer {
    async fn open(&self, _options: &ClientOptions) -> Result<Link> {
        let mut state = lock(&self.state);
        if !state.accepting {
            return Err(Error::Connection("connection refused".to_string()));
        }
        state.opened += 1;
        let connection_id = format!("conn-{}", state.opened);

        let (push_tx, push_rx) = mpsc::unbounded();
        let (client_tx, client_rx) = mpsc::unbounded();
        state.links.insert(connection_id.clone(), push_tx);
        state.client_sides.push(client_rx);

        Ok(Link {
            requester: Arc::new(MockRequester {
                state: self.state.clone(),
                connection_id,
            }),
            server_stream: push_rx.boxed(),
            client_stream: client_tx,
        })
    }
}

struct MockRequester {
    state: Arc<Mutex<ServerState>>,
    connection_id: String,
}

#[async_trait]
impl Requester for MockRequester {
    async fn request(&self, payload: Payload) -> Result<Payload> {
        let message_type = payload.message_type().to_string();
        let delay = lock(&self.state).delays.get(&message_type).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let body: Value = serde_json::from_slice(payload.body_bytes())?;
        let (kind, mut response) = {
            let mut state = lock(&self.state);
            if !state.links.contains_key(&self.connection_id) {
                return Err(Error::Connection(format!("{} is closed", self.connection_id)));
            }
            *state.requests.entry(message_type.clone()).or_default() += 1;
            state.handle(&self.connection_id, &message_type, &payload, &body)
        };
        response["requestId"] = body["requestId"].clone();
        Ok(Payload::new(kind, HashMap::new(), serde_json::to_vec(&response)?))
    }
}

impl ServerState {
    fn handle(&mut self, connection_id: &str, message_type: &str, payload: &Payload, body: &Value) -> (String, Value) {
        match message_type {
            "ServerCheckRequest" => return ok("ServerCheckResponse", json!({ "connectionId": connection_id })),
            "HealthCheckRequest" => return ok("HealthCheckResponse", json!({})),
            "LoginRequest" => return self.login(connection_id, body),
            _ => {}
        }

        if self.credentials.is_some() {
            let authorized = payload
                .header("accessToken")
                .is_some_and(|token| self.tokens.contains(token));
            if !authorized {
                return fail("ErrorResponse", 403, "access token invalid");
            }
        }

        match message_type {
            "ConfigQueryRequest" => self.query_config(body),
            "ConfigPublishRequest" => self.publish_config(body),
            "ConfigRemoveRequest" => self.remove_config(body),
            "ConfigBatchListenRequest" => self.batch_listen(connection_id, body),
            "InstanceRequest" => self.instance(connection_id, body),
            "BatchInstanceRequest" => self.batch_instance(connection_id, body),
            "SubscribeServiceRequest" => self.subscribe(connection_id, body),
            "ServiceQueryRequest" => {
                let key = Self::service_key(body);
                let service_info = self.service_info(&key, &text(body, "cluster"));
                ok("QueryServiceResponse", json!({ "serviceInfo": service_info }))
            }
            _ => fail("ErrorResponse", 500, "unknown request"),
        }
    }

    fn login(&mut self, connection_id: &str, body: &Value) -> (String, Value) {
        let Some((username, password)) = self.credentials.clone() else {
            return ok("LoginResponse", json!({ "accessToken": "anonymous", "tokenTtl": 18000 }));
        };
        if text(body, "username") != username || text(body, "password") != password {
            return fail("ErrorResponse", 401, "bad credentials");
        }
        let token = format!("token-{connection_id}");
        self.tokens.insert(token.clone());
        ok("LoginResponse", json!({ "accessToken": token, "tokenTtl": 18000 }))
    }

    fn config_key(body: &Value) -> ConfigKey {
        (text(body, "tenant"), text(body, "group"), text(body, "dataId"))
    }

    fn push(&mut self, connection_id: &str, message_type: &str, body: Value) {
        let Some(link) = self.links.get(connection_id) else {
            return;
        };
        let Ok(bytes) = serde_json::to_vec(&body) else {
            return;
        };
        if link
            .unbounded_send(Payload::new(message_type, HashMap::new(), bytes))
            .is_ok()
        {
            *self.pushes.entry(message_type.to_string()).or_default() += 1;
        }
    }

    fn notify_config_change(&mut self, key: &ConfigKey) {
        let (tenant, group, data_id) = key;
        let ids: Vec<String> = self
            .config_listeners
            .get(key)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        for id in ids {
            let body = json!({
                "tenant": tenant,
                "group": group,
                "dataId": data_id,
                "requestId": format!("push-{}", next_ref_time()),
            });
            self.push(&id, "ConfigChangeNotifyRequest", body);
        }
    }

    fn store_config(&mut self, data_id: &str, group: &str, tenant: &str, content: &str) {
        let key = (tenant.to_string(), group.to_string(), data_id.to_string());
        self.configs.insert(
            key.clone(),
            StoredConfig {
                content: content.to_string(),
                md5: md5_hex(content),
                last_modified: next_ref_time(),
            },
        );
        self.notify_config_change(&key);
    }

    fn query_config(&self, body: &Value) -> (String, Value) {
        match self.configs.get(&Self::config_key(body)) {
            Some(stored) => ok(
                "ConfigQueryResponse",
                json!({
                    "content": stored.content,
                    "md5": stored.md5,
                    "contentType": "text",
                    "lastModified": stored.last_modified,
                }),
            ),
            None => fail("ConfigQueryResponse", 300, "config data not exist"),
        }
    }

    fn publish_config(&mut self, body: &Value) -> (String, Value) {
        let key = Self::config_key(body);
        let cas_md5 = text(body, "casMd5");
        if !cas_md5.is_empty() {
            let current = self.configs.get(&key).map(|stored| stored.md5.clone());
            if current.as_deref() != Some(cas_md5.as_str()) {
                return fail("ConfigPublishResponse", 500, "cas publish failed, md5 mismatch");
            }
        }
        let (tenant, group, data_id) = key;
        self.store_config(&data_id, &group, &tenant, &text(body, "content"));
        ok("ConfigPublishResponse", json!({}))
    }

    fn remove_config(&mut self, body: &Value) -> (String, Value) {
        let key = Self::config_key(body);
        if self.configs.remove(&key).is_some() {
            self.notify_config_change(&key);
        }
        ok("ConfigRemoveResponse", json!({}))
    }

    fn batch_listen(&mut self, connection_id: &str, body: &Value) -> (String, Value) {
        let listen = body["listen"].as_bool().unwrap_or(false);
        let mut changed = Vec::new();
        for context in body["configListenContexts"].as_array().into_iter().flatten() {
            let key: ConfigKey = (text(context, "tenant"), text(context, "group"), text(context, "dataId"));
            if !listen {
                if let Some(listeners) = self.config_listeners.get_mut(&key) {
                    listeners.remove(connection_id);
                }
                continue;
            }
            self.config_listeners
                .entry(key.clone())
                .or_default()
                .insert(connection_id.to_string());
            let current = self
                .configs
                .get(&key)
                .map(|stored| stored.md5.clone())
                .unwrap_or_default();
            if current != text(context, "md5") {
                changed.push(json!({ "dataId": key.2, "group": key.1, "tenant": key.0 }));
            }
        }
        ok("ConfigChangeBatchListenResponse", json!({ "changedConfigs": changed }))
    }

    fn service_key(body: &Value) -> ServiceKey {
        (text(body, "namespace"), text(body, "groupName"), text(body, "serviceName"))
    }

    fn service_info(&self, key: &ServiceKey, clusters: &str) -> Value {
        let wanted: Vec<&str> = clusters.split(',').filter(|c| !c.is_empty()).collect();
        let hosts: Vec<Value> = self
            .services
            .get(key)
            .into_iter()
            .flatten()
            .filter(|stored| {
                let cluster = stored.instance["clusterName"].as_str().unwrap_or_default();
                wanted.is_empty() || wanted.iter().any(|wanted| *wanted == cluster)
            })
            .map(|stored| stored.instance.clone())
            .collect();
        json!({
            "name": key.2,
            "groupName": key.1,
            "clusters": clusters,
            "cacheMillis": 10000,
            "lastRefTime": next_ref_time(),
            "checksum": "",
            "allIPs": false,
            "reachProtectionThreshold": false,
            "hosts": hosts,
        })
    }

    fn notify_subscribers(&mut self, key: &ServiceKey) {
        let targets: Vec<(String, String)> = self
            .subscribers
            .get(key)
            .into_iter()
            .flatten()
            .map(|subscriber| (subscriber.connection_id.clone(), subscriber.clusters.clone()))
            .collect();
        for (connection_id, clusters) in targets {
            let body = json!({
                "namespace": key.0,
                "groupName": key.1,
                "serviceName": key.2,
                "serviceInfo": self.service_info(key, &clusters),
                "requestId": format!("push-{}", next_ref_time()),
            });
            self.push(&connection_id, "NotifySubscriberRequest", body);
        }
    }

    fn upsert_instance(&mut self, key: &ServiceKey, owner: &str, instance: Value) {
        let instances = self.services.entry(key.clone()).or_default();
        instances.retain(|stored| !same_endpoint(&stored.instance, &instance));
        instances.push(StoredInstance {
            owner: owner.to_string(),
            instance,
        });
    }

    fn instance(&mut self, connection_id: &str, body: &Value) -> (String, Value) {
        let key = Self::service_key(body);
        let r_type = text(body, "type");
        let instance = body["instance"].clone();
        match r_type.as_str() {
            "registerInstance" => self.upsert_instance(&key, connection_id, instance),
            "deregisterInstance" => {
                if let Some(instances) = self.services.get_mut(&key) {
                    instances.retain(|stored| !same_endpoint(&stored.instance, &instance));
                }
            }
            _ => return fail("InstanceResponse", 400, "unknown instance request type"),
        }
        self.notify_subscribers(&key);
        ok("InstanceResponse", json!({ "type": r_type }))
    }

    fn batch_instance(&mut self, connection_id: &str, body: &Value) -> (String, Value) {
        let key = Self::service_key(body);
        for instance in body["instances"].as_array().into_iter().flatten() {
            self.upsert_instance(&key, connection_id, instance.clone());
        }
        self.notify_subscribers(&key);
        ok("BatchInstanceResponse", json!({ "type": text(body, "type") }))
    }

    fn subscribe(&mut self, connection_id: &str, body: &Value) -> (String, Value) {
        let key = Self::service_key(body);
        let clusters = text(body, "clusters");
        let subscribers = self.subscribers.entry(key.clone()).or_default();
        subscribers.retain(|s| !(s.connection_id == connection_id && s.clusters == clusters));
        if body["subscribe"].as_bool().unwrap_or(false) {
            subscribers.push(Subscriber {
                connection_id: connection_id.to_string(),
                clusters: clusters.clone(),
            });
        }
        let service_info = self.service_info(&key, &clusters);
        ok("SubscribeServiceResponse", json!({ "serviceInfo": service_info }))
    }
}
