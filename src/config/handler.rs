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

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::api::remote::Payload;
use crate::common::remote::handler::ServerRequestHandler;
use crate::common::remote::message::{decode_push, reply_payload, RequestMessage};
use crate::config::message::request::ConfigChangeNotifyRequest;
use crate::config::message::response::ConfigChangeNotifyResponse;
use crate::config::util;

/// Handler for ConfigChangeNotify, forwards the changed group key to the worker.
pub(crate) struct ConfigChangeNotifyHandler {
    pub(crate) notify_change_tx: UnboundedSender<String>,
}

#[async_trait]
impl ServerRequestHandler for ConfigChangeNotifyHandler {
    async fn request_reply(&self, request: Payload) -> Option<Payload> {
        debug!("[ConfigChangeNotifyHandler] receive config-change, handle start.");
        let request = decode_push::<ConfigChangeNotifyRequest>(request)?;

        let namespace = request.namespace.clone().unwrap_or_default();
        let data_id = request.data_id.clone().unwrap_or_default();
        let group = request.group.clone().unwrap_or_default();
        info!(
            "receive config-change, dataId={},group={},namespace={}",
            data_id, group, namespace
        );

        let _ = self
            .notify_change_tx
            .send(util::group_key(&data_id, &group, &namespace));
        reply_payload(ConfigChangeNotifyResponse::ok(), request.request_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::remote::message::{Message, MessageBuilder, ResponseMessage};

    #[tokio::test]
    async fn test_notify_forwards_group_key() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler = ConfigChangeNotifyHandler {
            notify_change_tx: tx,
        };
        let request = ConfigChangeNotifyRequest {
            request_id: Some("7".to_string()),
            data_id: Some("todo-dataid".to_string()),
            group: Some("LOVE".to_string()),
            namespace: Some(String::new()),
            ..Default::default()
        };
        let payload = MessageBuilder::new(request).build().into_payload().unwrap();

        let reply = handler.request_reply(payload).await.unwrap();
        let reply = Message::<ConfigChangeNotifyResponse>::from_payload(reply)
            .unwrap()
            .into_body();
        assert!(reply.is_success());
        assert_eq!(ResponseMessage::request_id(&reply), Some(&"7".to_string()));
        assert_eq!(rx.recv().await.unwrap(), "todo-dataid+_+LOVE+_+");
    }
}
