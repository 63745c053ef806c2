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

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::api::constants::ENV_NACOS_CLIENT_LOGGER_LEVEL;
use crate::properties::get_value;

/// Keeps the non-blocking writer flushing for the life of the process.
static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

const LOG_FILE_NAME: &str = "nacos.log";

/// Install a daily rolling `$HOME/logs/nacos/nacos.log` subscriber, once.
///
/// Leaves an already installed global subscriber in place.
pub(crate) fn init() {
    LOG_GUARD.get_or_init(|| {
        let log_dir = home::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("logs")
            .join("nacos");
        let log_level = get_value(ENV_NACOS_CLIENT_LOGGER_LEVEL, "INFO");
        init_logging(log_dir, &log_level)
    });
}

fn init_logging(log_dir: PathBuf, log_level: &str) -> Option<WorkerGuard> {
    let log_level = LevelFilter::from_str(log_level).unwrap_or(LevelFilter::INFO);

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_filter(log_level);

    match tracing_subscriber::registry().with(file_layer).try_init() {
        Ok(()) => Some(guard),
        Err(_) => {
            tracing::debug!("a global subscriber is already set, nacos log file skipped");
            None
        }
    }
}
