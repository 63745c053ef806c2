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

//! The link a session runs over.
//!
//! Messages travel as [`Payload`]s: a [`Metadata`] (message type, client ip and
//! headers) plus a JSON body. A [`Transport`] opens a [`Link`]: a unary
//! [`Requester`], the stream of server pushes and a sink for one-way client
//! messages (the setup message and replies to pushes).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use futures::stream::BoxStream;
use lazy_static::lazy_static;
use prost::Message;

use crate::api::error::{Error, Result};
use crate::api::props::ClientOptions;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(string, tag = "3")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub client_ip: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "7")]
    pub headers:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    #[prost(message, optional, tag = "2")]
    pub metadata: ::core::option::Option<Metadata>,
    #[prost(message, optional, tag = "3")]
    pub body: ::core::option::Option<::prost_types::Any>,
}

impl Payload {
    pub fn new(
        message_type: impl Into<String>,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        let message_type = message_type.into();
        Payload {
            metadata: Some(Metadata {
                r#type: message_type.clone(),
                client_ip: String::new(),
                headers,
            }),
            body: Some(prost_types::Any {
                type_url: message_type,
                value: body,
            }),
        }
    }

    /// The message type, e.g. `ConfigQueryRequest`. Empty when absent.
    pub fn message_type(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.r#type.as_str())
            .unwrap_or_default()
    }

    /// The JSON body. Empty when absent.
    pub fn body_bytes(&self) -> &[u8] {
        self.body
            .as_ref()
            .map(|body| body.value.as_slice())
            .unwrap_or_default()
    }

    pub fn header(&self, key: &str) -> Option<&String> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.headers.get(key))
    }

    /// Protobuf wire form, for transports framing payloads themselves.
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Self> {
        Payload::decode(bytes).map_err(|e| Error::ErrResult(format!("invalid payload: {e}")))
    }
}

/// Unary request/response over a link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Requester: Send + Sync {
    /// A broken link must surface as [`Error::Connection`].
    async fn request(&self, payload: Payload) -> Result<Payload>;
}

/// One opened link. The link is considered lost when `server_stream` ends.
pub struct Link {
    pub requester: Arc<dyn Requester>,
    pub server_stream: BoxStream<'static, Payload>,
    pub client_stream: UnboundedSender<Payload>,
}

/// Opens links to the server named by [`ClientOptions::get_server_addr`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, options: &ClientOptions) -> Result<Link>;
}

/// Lifecycle of a shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

lazy_static! {
    static ref TRANSPORTS: RwLock<HashMap<String, Arc<dyn Transport>>> =
        RwLock::new(HashMap::new());
}

/// Registers the transport used for `server_addr` by clients built without an
/// explicit one. Returns the previous registration.
pub fn register_transport(
    server_addr: impl Into<String>,
    transport: Arc<dyn Transport>,
) -> Option<Arc<dyn Transport>> {
    TRANSPORTS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(server_addr.into(), transport)
}

pub fn unregister_transport(server_addr: &str) -> Option<Arc<dyn Transport>> {
    TRANSPORTS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(server_addr)
}

pub(crate) fn registered_transport(server_addr: &str) -> Result<Arc<dyn Transport>> {
    TRANSPORTS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(server_addr)
        .cloned()
        .ok_or_else(|| Error::Connection(format!("no transport registered for {server_addr}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accessors() {
        let mut headers = HashMap::new();
        headers.insert("app".to_string(), "todo-app".to_string());
        let payload = Payload::new(
            "ServiceQueryRequest",
            headers,
            Vec::from("{\"cluster\":\"DEFAULT\",\"healthyOnly\":true}"),
        );

        assert_eq!(payload.message_type(), "ServiceQueryRequest");
        assert_eq!(payload.header("app").map(String::as_str), Some("todo-app"));
        assert_eq!(
            payload.body_bytes(),
            b"{\"cluster\":\"DEFAULT\",\"healthyOnly\":true}"
        );

        let decoded = Payload::decode_from_bytes(&payload.encode_to_bytes()).unwrap();
        assert_eq!(decoded, payload);

        let empty = Payload::default();
        assert_eq!(empty.message_type(), "");
        assert!(empty.body_bytes().is_empty());
    }

    #[test]
    fn test_missing_transport() {
        let ret = registered_transport("must-not-exist:8848");
        assert!(matches!(ret, Err(Error::Connection(_))));
    }
}
