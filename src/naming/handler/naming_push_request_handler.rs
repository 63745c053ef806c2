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

use async_trait::async_trait;
use tracing::info;

use crate::api::remote::Payload;
use crate::common::remote::handler::ServerRequestHandler;
use crate::common::remote::message::{decode_push, reply_payload, RequestMessage};
use crate::naming::message::request::NotifySubscriberRequest;
use crate::naming::message::response::NotifySubscriberResponse;
use crate::naming::observable::ServiceInfoEmitter;

/// Applies pushed service infos through the emitter and acknowledges them.
pub(crate) struct NamingPushRequestHandler {
    pub(crate) emitter: Arc<ServiceInfoEmitter>,
}

#[async_trait]
impl ServerRequestHandler for NamingPushRequestHandler {
    async fn request_reply(&self, request: Payload) -> Option<Payload> {
        let request = decode_push::<NotifySubscriberRequest>(request)?;
        let request_id = request.request_id().cloned();
        info!(
            "receive NotifySubscriberRequest, service={}, hosts={}",
            request.service_info.key(),
            request.service_info.ip_count()
        );

        self.emitter.emit(request.service_info);
        reply_payload(NotifySubscriberResponse::ok(), request_id.as_ref())
    }
}
