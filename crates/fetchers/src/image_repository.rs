//! Content-addressed OS image cache. `ensure` downloads and extracts a
//! dstack image tarball into `cache_dir/{image_folder_name}` the first time
//! it's asked for, then serves subsequent callers from disk. Concurrent
//! callers asking for the same name within one process share a single
//! download via the in-process promise map; concurrent processes coordinate
//! through a lock file on disk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

use crate::retry::backoff_delay;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(3);
const JITTER: Duration = Duration::from_millis(120);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(600);
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error, Clone)]
pub enum ImageRepositoryError {
    #[error("download failed after {0} attempts: {1}")]
    DownloadFailed(u32, String),
    #[error("extracted image missing metadata.json")]
    MissingMetadata,
    #[error("timed out ensuring image after {0:?}")]
    TimedOut(Duration),
    #[error("io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Returns the local path to the extracted image, downloading it first
    /// if it isn't already cached.
    async fn ensure(&self, image_folder_name: &str) -> Result<PathBuf, ImageRepositoryError>;
}

pub struct FsImageRepository {
    client: reqwest::Client,
    cache_dir: PathBuf,
    download_base_url: String,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Result<PathBuf, ImageRepositoryError>>>>>,
}

impl FsImageRepository {
    pub fn new(cache_dir: impl Into<PathBuf>, download_base_url: impl Into<String>) -> Self {
        FsImageRepository {
            client: reqwest::Client::new(),
            cache_dir: cache_dir.into(),
            download_base_url: download_base_url.into(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn image_dir(&self, image_folder_name: &str) -> PathBuf {
        self.cache_dir.join(image_folder_name)
    }

    fn lock_path(&self, image_folder_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{image_folder_name}.lock"))
    }

    fn is_complete(dir: &Path) -> bool {
        dir.join("metadata.json").is_file()
    }

    /// A lock file older than 30 minutes is assumed abandoned by a crashed
    /// process and is safe to reclaim.
    fn lock_is_stale(lock_path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(lock_path) else { return true };
        let Ok(modified) = metadata.modified() else { return true };
        SystemTime::now().duration_since(modified).unwrap_or_default() > LOCK_STALE_AFTER
    }

    async fn acquire_fs_lock(&self, image_folder_name: &str) -> Result<(), ImageRepositoryError> {
        let lock_path = self.lock_path(image_folder_name);
        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::lock_is_stale(&lock_path) {
                        let _ = std::fs::remove_file(&lock_path);
                        continue;
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(ImageRepositoryError::Io(e.to_string())),
            }
        }
    }

    fn release_fs_lock(&self, image_folder_name: &str) {
        let _ = std::fs::remove_file(self.lock_path(image_folder_name));
    }

    async fn download_and_extract(&self, image_folder_name: &str) -> Result<PathBuf, ImageRepositoryError> {
        let dest = self.image_dir(image_folder_name);
        if Self::is_complete(&dest) {
            return Ok(dest);
        }

        self.acquire_fs_lock(image_folder_name).await?;
        let result = self.download_and_extract_locked(image_folder_name, &dest).await;
        self.release_fs_lock(image_folder_name);
        result
    }

    async fn download_and_extract_locked(
        &self,
        image_folder_name: &str,
        dest: &Path,
    ) -> Result<PathBuf, ImageRepositoryError> {
        // Re-check after acquiring the lock: another process may have
        // finished the extraction while we were waiting for it.
        if Self::is_complete(dest) {
            return Ok(dest.to_path_buf());
        }

        let mut last_error = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            match self.try_download_and_extract(image_folder_name, dest).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    last_error = e;
                    let _ = std::fs::remove_dir_all(dest);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt, BASE_DELAY, MAX_DELAY, JITTER)).await;
                    }
                }
            }
        }

        warn!(image_folder_name, error = %last_error, "image download exhausted retries");
        Err(ImageRepositoryError::DownloadFailed(MAX_ATTEMPTS, last_error))
    }

    async fn try_download_and_extract(&self, image_folder_name: &str, dest: &Path) -> Result<PathBuf, String> {
        let url = format!("{}/{}.tar.gz", self.download_base_url, image_folder_name);
        let response = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;

        std::fs::create_dir_all(dest).map_err(|e| e.to_string())?;
        let decoder = flate2::read::GzDecoder::new(&bytes[..]);
        let mut archive = tar::Archive::new(decoder);
        archive.unpack(dest).map_err(|e| e.to_string())?;

        if !Self::is_complete(dest) {
            return Err("extracted image missing metadata.json".to_string());
        }
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl ImageRepository for FsImageRepository {
    async fn ensure(&self, image_folder_name: &str) -> Result<PathBuf, ImageRepositoryError> {
        let dest = self.image_dir(image_folder_name);
        if Self::is_complete(&dest) {
            return Ok(dest);
        }

        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(image_folder_name.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = tokio::time::timeout(OVERALL_TIMEOUT, async {
            cell.get_or_init(|| async { self.download_and_extract(image_folder_name).await }).await.clone()
        })
        .await;

        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(image_folder_name);
        }

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ImageRepositoryError::TimedOut(OVERALL_TIMEOUT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_complete_requires_metadata_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!FsImageRepository::is_complete(dir.path()));
        std::fs::write(dir.path().join("metadata.json"), "{}").unwrap();
        assert!(FsImageRepository::is_complete(dir.path()));
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("image.lock");
        std::fs::write(&lock_path, "").unwrap();
        assert!(!FsImageRepository::lock_is_stale(&lock_path));
    }

    #[test]
    fn missing_lock_file_counts_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsImageRepository::lock_is_stale(&dir.path().join("nope.lock")));
    }

    #[tokio::test]
    async fn ensure_returns_cached_path_without_network_when_already_complete() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("dstack-0.5.3");
        std::fs::create_dir_all(&image_dir).unwrap();
        std::fs::write(image_dir.join("metadata.json"), "{}").unwrap();

        let repo = FsImageRepository::new(dir.path(), "http://127.0.0.1:1");
        let result = repo.ensure("dstack-0.5.3").await.unwrap();
        assert_eq!(result, image_dir);
    }
}
