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

pub(crate) mod handler;
pub(crate) mod message;
pub(crate) mod session;

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

// odd by client request id.
const SEQUENCE_INITIAL_VALUE: i64 = 1;
const SEQUENCE_DELTA: i64 = 2;
static ATOMIC_SEQUENCE: AtomicI64 = AtomicI64::new(SEQUENCE_INITIAL_VALUE);

pub(crate) fn generate_request_id() -> String {
    let seq = ATOMIC_SEQUENCE.fetch_add(SEQUENCE_DELTA, Ordering::Relaxed);
    if seq > i64::MAX - 1000 {
        ATOMIC_SEQUENCE.store(SEQUENCE_INITIAL_VALUE, Ordering::SeqCst);
    }
    seq.to_string()
}

const BACKOFF_BASE_MS: u64 = 200;
const BACKOFF_MAX_MS: u64 = 5000;

/// Delay before reconnect attempt `retry_count` (0-based): 200ms doubling,
/// capped at 5s.
pub(crate) fn backoff(retry_count: u32) -> Duration {
    let factor = 1u64 << retry_count.min(16);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_odd_and_unique() {
        let a = generate_request_id().parse::<i64>().unwrap();
        let b = generate_request_id().parse::<i64>().unwrap();
        assert_ne!(a, b);
        assert_eq!(a % 2, 1);
        assert_eq!(b % 2, 1);
    }

    #[test]
    fn test_backoff() {
        assert_eq!(backoff(0), Duration::from_millis(200));
        assert_eq!(backoff(1), Duration::from_millis(400));
        assert_eq!(backoff(4), Duration::from_millis(3200));
        assert_eq!(backoff(5), Duration::from_millis(5000));
        assert_eq!(backoff(60), Duration::from_millis(5000));
    }
}
