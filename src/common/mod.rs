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

//! Internal building blocks shared by the config and naming clients.
//!
//! - `cache`: key/value cache with an optional disk store
//! - `dispatch`: serialized, panic-isolated delivery of listener callbacks
//! - `executor`: the runtime background tasks and callbacks run on
//! - `remote`: messages, server push handlers and the shared session
//! - `log`: tracing initialization (optional, enabled via `tracing-log` feature)

pub(crate) mod cache;
pub(crate) mod dispatch;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod remote;

#[cfg(feature = "tracing-log")]
pub(crate) mod log;
