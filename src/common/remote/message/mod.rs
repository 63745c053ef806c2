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

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;

use lazy_static::lazy_static;
use prost_types::Any;
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::api::error::Error::ErrResult;
use crate::api::error::Result;
use crate::api::remote::{Metadata, Payload};

pub(crate) mod request;
pub(crate) mod response;

lazy_static! {
    pub(crate) static ref LOCAL_IP: String =
        local_ipaddress::get().unwrap_or_else(|| "127.0.0.1".to_string());
}

/// A typed message with the envelope it travels in.
#[derive(Debug)]
pub(crate) struct Message<T>
where
    T: MessageData,
{
    headers: HashMap<String, String>,
    body: T,
    client_ip: String,
}

impl<T> Message<T>
where
    T: MessageData,
{
    pub(crate) fn body(&self) -> &T {
        &self.body
    }

    pub(crate) fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub(crate) fn into_body(self) -> T {
        self.body
    }

    pub(crate) fn into_payload(self) -> Result<Payload> {
        let body = self.body.to_proto_any().map_err(|e| {
            error!("Serialize message body {} occur an error: {}", T::identity(), e);
            e
        })?;

        Ok(Payload {
            metadata: Some(Metadata {
                r#type: T::identity().to_string(),
                client_ip: self.client_ip,
                headers: self.headers,
            }),
            body: Some(body),
        })
    }

    pub(crate) fn from_payload(payload: Payload) -> Result<Self> {
        let body = payload
            .body
            .ok_or_else(|| ErrResult("payload body is empty".to_string()))?;
        let body = T::from_proto_any(body).map_err(|e| {
            error!("Deserialize payload to {} occur an error: {}", T::identity(), e);
            e
        })?;

        let (client_ip, headers) = match payload.metadata {
            Some(metadata) => (metadata.client_ip, metadata.headers),
            None => (String::new(), HashMap::new()),
        };

        Ok(Message {
            headers,
            body,
            client_ip,
        })
    }
}

/// Implemented by `#[request]` and `#[response]` structs.
pub(crate) trait MessageData: Debug + Clone + Serialize + DeserializeOwned + Send {
    fn identity<'a>() -> Cow<'a, str>;

    fn to_proto_any(&self) -> Result<Any> {
        Ok(Any {
            type_url: Self::identity().to_string(),
            value: serde_json::to_vec(self)?,
        })
    }

    fn from_proto_any(any: Any) -> Result<Self> {
        Ok(serde_json::from_slice(&any.value)?)
    }
}

pub(crate) trait RequestMessage: MessageData {
    fn header(&self, key: &str) -> Option<&String>;

    fn headers(&self) -> &HashMap<String, String>;

    fn take_headers(&mut self) -> HashMap<String, String>;

    fn add_headers(&mut self, map: HashMap<String, String>);

    fn request_id(&self) -> Option<&String>;

    fn set_request_id(&mut self, request_id: String);

    fn module(&self) -> &str;
}

pub(crate) trait ResponseMessage: MessageData {
    fn request_id(&self) -> Option<&String>;

    fn set_request_id(&mut self, request_id: String);

    fn result_code(&self) -> i32;

    fn error_code(&self) -> i32;

    fn message(&self) -> Option<&String>;

    fn is_success(&self) -> bool;
}

pub(crate) struct MessageBuilder<T>
where
    T: MessageData,
{
    headers: HashMap<String, String>,
    body: T,
    client_ip: String,
}

impl<T> MessageBuilder<T>
where
    T: MessageData,
{
    pub(crate) fn new(body: T) -> Self {
        MessageBuilder {
            headers: HashMap::new(),
            body,
            client_ip: LOCAL_IP.to_owned(),
        }
    }

    pub(crate) fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub(crate) fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub(crate) fn build(self) -> Message<T> {
        Message {
            headers: self.headers,
            body: self.body,
            client_ip: self.client_ip,
        }
    }
}

/// Decode a server push into `T`.
pub(crate) fn decode_push<T: RequestMessage>(payload: Payload) -> Option<T> {
    match Message::<T>::from_payload(payload) {
        Ok(message) => Some(message.into_body()),
        Err(e) => {
            error!("convert payload to {} failed: {}", T::identity(), e);
            None
        }
    }
}

/// Build the reply to a server push. The reply carries the push's request id.
pub(crate) fn reply_payload<R: ResponseMessage>(
    mut response: R,
    request_id: Option<&String>,
) -> Option<Payload> {
    if let Some(request_id) = request_id {
        response.set_request_id(request_id.clone());
    }
    match MessageBuilder::new(response).build().into_payload() {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!("convert {} to payload failed: {}", R::identity(), e);
            None
        }
    }
}
