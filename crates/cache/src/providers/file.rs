//! # File Cache
//!
//! File-based persistent key/value store. Each entry is a data file plus a
//! JSON `.meta` sidecar, grouped in one subdirectory per category.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::types::{
    CacheCategory, CacheKey, CacheLookupResult, CacheMetadata, CacheResult, CacheStatus,
};

use super::CacheProvider;

const CATEGORIES: [CacheCategory; 6] = [
    CacheCategory::Manifest,
    CacheCategory::Catalog,
    CacheCategory::TitleMeta,
    CacheCategory::Stream,
    CacheCategory::Static,
    CacheCategory::Api,
];

#[derive(Debug, Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
    initialized: Arc<AtomicBool>,
}

impl FileCache {
    /// Create a new file cache with the specified directory
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Initialize the cache directories
    pub(crate) async fn ensure_initialized(&self) -> io::Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        // Directory creation is idempotent, so racing initialisers are harmless.
        fs::create_dir_all(&self.cache_dir).await?;
        for category in CATEGORIES {
            fs::create_dir_all(self.cache_dir.join(category.as_str())).await?;
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Get the path for a cached resource
    fn get_cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(key.category.as_str())
            .join(key.to_filename())
    }

    /// Get the metadata path for a cached resource
    fn get_metadata_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.get_cache_path(key);
        path.set_extension("meta");
        path
    }

    async fn remove_pair(data_path: &Path, meta_path: &Path) {
        let _ = fs::remove_file(data_path).await;
        let _ = fs::remove_file(meta_path).await;
    }
}

#[async_trait::async_trait]
impl CacheProvider for FileCache {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        self.ensure_initialized().await?;

        let data_exists = fs::try_exists(self.get_cache_path(key)).await?;
        let meta_exists = fs::try_exists(self.get_metadata_path(key)).await?;

        Ok(data_exists && meta_exists)
    }

    async fn get(&self, key: &CacheKey) -> CacheLookupResult {
        self.ensure_initialized().await?;

        let data_path = self.get_cache_path(key);
        let meta_path = self.get_metadata_path(key);

        let metadata_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to read cache metadata file");
                return Ok(None);
            }
        };

        let metadata: CacheMetadata = match serde_json::from_slice(&metadata_bytes) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Failed to parse cache metadata");
                Self::remove_pair(&data_path, &meta_path).await;
                return Ok(None);
            }
        };

        let data = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to read cache data file");
                return Ok(None);
            }
        };

        let status = if metadata.is_expired() {
            // Expired entries are still returned once, then dropped
            Self::remove_pair(&data_path, &meta_path).await;
            CacheStatus::Expired
        } else {
            CacheStatus::Hit
        };

        Ok(Some((Bytes::from(data), metadata, status)))
    }

    async fn put(&self, key: CacheKey, data: Bytes, metadata: CacheMetadata) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let data_path = self.get_cache_path(&key);
        let meta_path = self.get_metadata_path(&key);

        let metadata_json = serde_json::to_vec(&metadata).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize metadata: {e}"),
            )
        })?;

        // Write to temporary files first, then rename into place
        let temp_data_path = data_path.with_extension("tmp");
        let temp_meta_path = meta_path.with_extension("metatmp");

        if let Err(e) = fs::write(&temp_data_path, &data).await {
            warn!(path = ?temp_data_path, error = %e, "Failed to write cache data file");
            return Err(e);
        }

        if let Err(e) = fs::write(&temp_meta_path, &metadata_json).await {
            warn!(path = ?temp_meta_path, error = %e, "Failed to write cache metadata file");
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            warn!(
                from = ?temp_data_path,
                to = ?data_path,
                error = %e,
                "Failed to rename temporary data file"
            );
            Self::remove_pair(&temp_data_path, &temp_meta_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            warn!(
                from = ?temp_meta_path,
                to = ?meta_path,
                error = %e,
                "Failed to rename temporary metadata file"
            );
            Self::remove_pair(&data_path, &temp_meta_path).await;
            return Err(e);
        }

        debug!(key = %key.key, "Cached entry to file");
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let data_path = self.get_cache_path(key);
        let meta_path = self.get_metadata_path(key);

        let data_result = fs::remove_file(&data_path).await;
        let meta_result = fs::remove_file(&meta_path).await;

        match (data_result, meta_result) {
            (Err(e), _) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?data_path, error = %e, "Failed to remove cache data file");
                Err(e)
            }
            (_, Err(e)) if e.kind() != io::ErrorKind::NotFound => {
                warn!(path = ?meta_path, error = %e, "Failed to remove cache metadata file");
                Err(e)
            }
            _ => Ok(()),
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        let mut entry_count = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => entry_count += 1,
                Err(e) => warn!(path = ?path, error = %e, "Failed to remove cache entry"),
            }
        }

        debug!(count = entry_count, "Cleared cache entries");

        self.initialized.store(false, Ordering::Release);
        self.ensure_initialized().await
    }

    async fn sweep(&self) -> CacheResult<()> {
        self.ensure_initialized().await?;

        let mut removed = 0usize;
        for category in CATEGORIES {
            let dir = self.cache_dir.join(category.as_str());
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let meta_path = entry.path();
                if meta_path.extension().and_then(|ext| ext.to_str()) != Some("meta") {
                    continue;
                }

                let expired = match fs::read(&meta_path).await {
                    Ok(bytes) => serde_json::from_slice::<CacheMetadata>(&bytes)
                        .map(|meta| meta.is_expired())
                        .unwrap_or(true),
                    Err(_) => continue,
                };

                if expired {
                    Self::remove_pair(&meta_path.with_extension(""), &meta_path).await;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, "Swept expired file cache entries");
        }
        Ok(())
    }
}
