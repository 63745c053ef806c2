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

use tokio::sync::mpsc;
use tracing::{debug, error, Instrument};

use crate::common::executor;

/// Delivers events to one listener, one at a time and in order.
///
/// Each callback runs on the blocking pool of the client runtime, so a slow
/// listener never stalls the session, and a panicking one only loses the
/// event it panicked on. The worker task ends once the dispatcher is dropped
/// and the queue is drained.
pub(crate) struct Dispatcher<E> {
    sender: mpsc::UnboundedSender<E>,
}

impl<E> Dispatcher<E>
where
    E: Send + 'static,
{
    pub(crate) fn new(name: String, callback: Arc<dyn Fn(E) + Send + Sync>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<E>();
        let span = tracing::debug_span!("dispatcher", listener = %name);

        executor::spawn(
            async move {
                while let Some(event) = receiver.recv().await {
                    let callback = callback.clone();
                    let ret = tokio::task::spawn_blocking(move || callback(event)).await;
                    if let Err(e) = ret {
                        if e.is_panic() {
                            error!("listener panicked, the event is dropped");
                        } else {
                            error!("listener task failed: {e}");
                        }
                    }
                }
                debug!("dispatcher closed");
            }
            .instrument(span),
        );

        Dispatcher { sender }
    }

    /// Queues the event. Returns false once the worker is gone.
    pub(crate) fn dispatch(&self, event: E) -> bool {
        self.sender.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_in_order_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let dispatcher = Dispatcher::new(
            "ordered".to_string(),
            Arc::new(move |n: u32| {
                std::thread::sleep(Duration::from_millis(5));
                seen_clone.lock().unwrap().push(n);
            }),
        );

        for n in 0..10 {
            assert!(dispatcher.dispatch(n));
        }
        wait_until(|| seen.lock().unwrap().len() == 10);
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_is_isolated() {
        let ok_count = Arc::new(AtomicUsize::new(0));
        let ok_clone = ok_count.clone();
        let dispatcher = Dispatcher::new(
            "panicky".to_string(),
            Arc::new(move |n: u32| {
                if n == 1 {
                    panic!("listener failure");
                }
                ok_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(0);
        dispatcher.dispatch(1);
        dispatcher.dispatch(2);
        wait_until(|| ok_count.load(Ordering::SeqCst) == 2);
    }
}
