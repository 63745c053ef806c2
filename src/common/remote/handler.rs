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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::remote::Payload;
use crate::common::remote::message::request::ClientDetectionRequest;
use crate::common::remote::message::response::ClientDetectionResponse;
use crate::common::remote::message::{decode_push, reply_payload, RequestMessage};

/// Handles one type of server push; the returned payload is sent back as the reply.
#[async_trait]
pub(crate) trait ServerRequestHandler: Send + Sync {
    async fn request_reply(&self, request: Payload) -> Option<Payload>;
}

type HandlerEntry = (u64, Arc<dyn ServerRequestHandler>);

/// Push type -> handlers. Several clients on one session register for the
/// same type; every handler sees the push and the first reply wins.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<HandlerEntry>>>,
}

impl HandlerRegistry {
    pub(crate) fn register(
        self: &Arc<Self>,
        message_type: impl Into<String>,
        handler: Arc<dyn ServerRequestHandler>,
    ) -> HandlerGuard {
        let message_type = message_type.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(message_type.clone())
            .or_default()
            .push((id, handler));

        debug!("register handler {id} for {message_type}");
        HandlerGuard {
            registry: Arc::downgrade(self),
            message_type,
            id,
        }
    }

    fn unregister(&self, message_type: &str, id: u64) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entries) = handlers.get_mut(message_type) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                handlers.remove(message_type);
            }
        }
    }

    fn handlers_of(&self, message_type: &str) -> Vec<Arc<dyn ServerRequestHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(message_type)
            .map(|entries| entries.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) async fn dispatch(&self, payload: Payload) -> Option<Payload> {
        let message_type = payload.message_type().to_owned();
        let handlers = self.handlers_of(&message_type);
        if handlers.is_empty() {
            warn!("unknown receive type={message_type}, no handler registered");
            return None;
        }

        let mut reply = None;
        for handler in handlers {
            let ret = handler.request_reply(payload.clone()).await;
            if reply.is_none() {
                reply = ret;
            }
        }
        reply
    }
}

/// Removes the handler when dropped.
pub(crate) struct HandlerGuard {
    registry: Weak<HandlerRegistry>,
    message_type: String,
    id: u64,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.message_type, self.id);
        }
    }
}

/// Answers the server's liveness probe.
pub(crate) struct ClientDetectionRequestHandler;

#[async_trait]
impl ServerRequestHandler for ClientDetectionRequestHandler {
    async fn request_reply(&self, request: Payload) -> Option<Payload> {
        let request = decode_push::<ClientDetectionRequest>(request)?;
        info!("receive ClientDetectionRequest, request_id={:?}", request.request_id());
        reply_payload(ClientDetectionResponse::ok(), request.request_id())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::common::remote::message::{Message, MessageBuilder, ResponseMessage};

    struct Echo(&'static str);

    #[async_trait]
    impl ServerRequestHandler for Echo {
        async fn request_reply(&self, _request: Payload) -> Option<Payload> {
            Some(Payload::new(self.0, HashMap::new(), Vec::new()))
        }
    }

    struct Silent;

    #[async_trait]
    impl ServerRequestHandler for Silent {
        async fn request_reply(&self, _request: Payload) -> Option<Payload> {
            None
        }
    }

    #[tokio::test]
    async fn test_dispatch_first_reply_wins() {
        let registry = Arc::new(HandlerRegistry::default());
        let _silent = registry.register("Push", Arc::new(Silent));
        let first = registry.register("Push", Arc::new(Echo("first")));
        let _second = registry.register("Push", Arc::new(Echo("second")));

        let push = Payload::new("Push", HashMap::new(), Vec::new());
        let reply = registry.dispatch(push.clone()).await.unwrap();
        assert_eq!(reply.message_type(), "first");

        drop(first);
        let reply = registry.dispatch(push).await.unwrap();
        assert_eq!(reply.message_type(), "second");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_type() {
        let registry = Arc::new(HandlerRegistry::default());
        let guard = registry.register("Push", Arc::new(Echo("first")));
        drop(guard);
        let push = Payload::new("Push", HashMap::new(), Vec::new());
        assert!(registry.dispatch(push).await.is_none());
    }

    #[tokio::test]
    async fn test_client_detection_reply() {
        let request = ClientDetectionRequest {
            request_id: Some("11".to_string()),
            ..Default::default()
        };
        let payload = MessageBuilder::new(request).build().into_payload().unwrap();

        let reply = ClientDetectionRequestHandler
            .request_reply(payload)
            .await
            .unwrap();
        let reply = Message::<ClientDetectionResponse>::from_payload(reply)
            .unwrap()
            .into_body();
        assert!(reply.is_success());
        assert_eq!(ResponseMessage::request_id(&reply), Some(&"11".to_string()));
    }
}
