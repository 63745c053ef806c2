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

use std::{borrow::Cow, collections::HashMap, io::BufReader, path::PathBuf};

use async_trait::async_trait;
use serde::de;
use tokio::{
    fs::{create_dir_all, remove_file, rename, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
    time::{sleep, Duration},
};
use tracing::{debug, error, info, instrument, warn};

use super::Store;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;
const TMP_EXTENSION: &str = "tmp";

/// Keys may contain path separators, so file names are url-encoded.
pub(super) fn file_name(key: &str) -> String {
    url::form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

fn key_of(file_name: &str) -> String {
    url::form_urlencoded::parse(format!("k={file_name}").as_bytes())
        .next()
        .map(|(_, key)| key.into_owned())
        .unwrap_or_else(|| file_name.to_owned())
}

/// One JSON file per key, written through a temp file and renamed into place.
pub(crate) struct DiskStore {
    disk_path: PathBuf,
    write_lock: Mutex<()>,
}

type IoResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

impl DiskStore {
    pub(crate) fn new(disk_path: PathBuf) -> Self {
        info!(path = %disk_path.display(), "Creating DiskStore");
        Self {
            disk_path,
            write_lock: Mutex::new(()),
        }
    }

    async fn try_save(&self, write_path: &PathBuf, value: &[u8]) -> IoResult {
        create_dir_all(&self.disk_path).await?;

        let tmp_path = write_path.with_extension(TMP_EXTENSION);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        drop(file);

        rename(&tmp_path, write_path).await?;
        Ok(())
    }

    async fn try_remove(&self, path: &PathBuf) -> IoResult {
        if path.exists() {
            remove_file(path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<V> Store<V> for DiskStore
where
    V: de::DeserializeOwned + Send,
{
    fn name(&self) -> Cow<'_, str> {
        Cow::from("disk-store")
    }

    fn load(&self) -> HashMap<String, V> {
        let mut loaded = HashMap::new();
        let disk_path_display = self.disk_path.display();

        let dir_iter = match std::fs::read_dir(&self.disk_path) {
            Ok(iter) => iter,
            Err(e) => {
                info!(path = %disk_path_display, error = %e, "Cache directory not readable, nothing loaded");
                return loaded;
            }
        };

        let mut failed_count = 0u64;
        for entry in dir_iter.flatten() {
            let path = entry.path();
            if path.is_dir() || path.extension().map_or(false, |ext| ext == TMP_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().map(|f| f.to_string_lossy().to_string()) else {
                continue;
            };

            let value = std::fs::File::open(&path)
                .map_err(|e| e.to_string())
                .and_then(|file| {
                    serde_json::from_reader::<_, V>(BufReader::new(file)).map_err(|e| e.to_string())
                });
            match value {
                Ok(value) => {
                    debug!(file = %file_name, "Loaded cache entry");
                    loaded.insert(key_of(&file_name), value);
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Failed to load cache file");
                    failed_count += 1;
                }
            }
        }

        info!(
            path = %disk_path_display,
            loaded = loaded.len(),
            failed = failed_count,
            "Cache loading completed"
        );
        loaded
    }

    #[instrument(fields(key = key), skip_all)]
    async fn save(&self, key: &str, value: Vec<u8>) {
        let write_path = self.disk_path.join(file_name(key));
        let _guard = self.write_lock.lock().await;

        for attempt in 1..=MAX_RETRIES {
            match self.try_save(&write_path, &value).await {
                Ok(()) => {
                    debug!(path = %write_path.display(), "Cache entry saved");
                    return;
                }
                Err(e) if attempt == MAX_RETRIES => {
                    error!(path = %write_path.display(), error = %e, "Failed to save cache entry after all retries");
                }
                Err(e) => {
                    warn!(path = %write_path.display(), attempt, error = %e, "Save attempt failed, retrying");
                    sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
            }
        }
    }

    #[instrument(fields(key = key), skip_all)]
    async fn remove(&self, key: &str) {
        let delete_path = self.disk_path.join(file_name(key));
        let _guard = self.write_lock.lock().await;

        for attempt in 1..=MAX_RETRIES {
            match self.try_remove(&delete_path).await {
                Ok(()) => {
                    debug!(path = %delete_path.display(), "Cache entry removed");
                    return;
                }
                Err(e) if attempt == MAX_RETRIES => {
                    error!(path = %delete_path.display(), error = %e, "Failed to remove cache entry after all retries");
                }
                Err(e) => {
                    warn!(path = %delete_path.display(), attempt, error = %e, "Remove attempt failed, retrying");
                    sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_round_trip() {
        let key = "DEFAULT_GROUP@@todo/service@@c1,c2";
        let name = file_name(key);
        assert!(!name.contains('/'));
        assert_eq!(key_of(&name), key);
    }
}
