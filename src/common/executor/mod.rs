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

use std::thread::available_parallelism;

use futures::Future;
use lazy_static::lazy_static;
use tokio::{
    runtime::{Builder, Runtime},
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};

use crate::api::error::Result;

lazy_static! {
    static ref RT: Runtime = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(available_parallelism().map(|n| n.get()).unwrap_or(1) * 2 + 1)
        .thread_name("nacos-client-thread-pool")
        .build()
        .unwrap_or_else(|e| panic!("nacos client runtime cannot start: {e}"));
}

pub(crate) fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    RT.spawn(future)
}

/// Runs `func` every `duration`, the first time after one period, until it
/// returns `None` or the handle is aborted.
pub(crate) fn schedule_at_fixed_delay<Fut>(
    func: impl Fn() -> Option<Fut> + Send + 'static,
    duration: Duration,
) -> JoinHandle<()>
where
    Fut: Future + Send + 'static,
{
    RT.spawn(async move {
        let mut interval = interval(duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(future) = func() else {
                break;
            };
            future.await;
        }
    })
}

/// Drives `future` on the client runtime and parks the calling thread until it
/// completes. Safe to call from inside another runtime's worker thread.
pub(crate) fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = RT.spawn(future);
    futures::executor::block_on(handle)?
}

#[cfg(test)]
mod tests {

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::api::error::Error;

    #[test]
    fn test_spawn() {
        let handler = spawn(async { 5 });
        let ret = RT.block_on(handler);
        assert_eq!(ret.unwrap(), 5);
    }

    #[test]
    fn test_schedule_at_fixed_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let handler = schedule_at_fixed_delay(
            move || {
                let counter = counter_clone.clone();
                Some(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            },
            Duration::from_millis(50),
        );

        std::thread::sleep(std::time::Duration::from_millis(300));
        handler.abort();
        std::thread::sleep(std::time::Duration::from_millis(100));
        let ran = counter.load(Ordering::SeqCst);
        assert!(ran >= 2, "ran {ran} times");

        std::thread::sleep(std::time::Duration::from_millis(200));
        assert_eq!(counter.load(Ordering::SeqCst), ran);
    }

    #[test]
    fn test_block_on() {
        let ret = block_on(async { Ok(7) });
        assert_eq!(ret.unwrap(), 7);

        let ret: Result<()> = block_on(async { Err(Error::Timeout(1)) });
        assert!(matches!(ret, Err(Error::Timeout(1))));
    }

    #[tokio::test]
    async fn test_block_on_inside_runtime() {
        let ret = tokio::task::spawn_blocking(|| block_on(async { Ok("nested") }))
            .await
            .unwrap();
        assert_eq!(ret.unwrap(), "nested");
    }
}
