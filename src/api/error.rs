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

/// Nacos binding Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Nacos binding Error.
///
/// Callers branch on the variant: a missing config is [`Error::NotFound`], not
/// an empty string, and a deadline is [`Error::Timeout`], distinct from a
/// broken link ([`Error::Connection`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested config (or instance) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation did not complete within its timeout.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The session could not reach the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the credentials or the access token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Arguments were rejected before anything was sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered but did not succeed.
    #[error("get result failed: {0}")]
    ErrResult(String),

    #[error("remote client shutdown: {0}")]
    ClientShutdown(String),

    #[error("tokio task join failed: {0}")]
    TokioJoin(#[from] tokio::task::JoinError),

    #[error("tokio oneshot receive failed: {0}")]
    TokioOneshotRecv(#[from] tokio::sync::oneshot::error::RecvError),
}

impl Error {
    /// Whether this error is [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this error is [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
