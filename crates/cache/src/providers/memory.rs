//! # Memory Cache Provider
//!
//! In-memory cache implementation using Moka. Serves both as the edge tier
//! (keyed by request URL) and as the default key/value store.

use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::providers::CacheProvider;
use crate::types::{CacheKey, CacheLookupResult, CacheMetadata, CacheResult, CacheStatus, unix_now};

/// Entry in the memory cache
#[derive(Clone)]
struct CacheEntry {
    /// Cached data bytes
    data: Bytes,
    /// Metadata for the cached content
    metadata: CacheMetadata,
}

/// Memory cache provider implementation using Moka
#[derive(Clone)]
pub struct MemoryCache {
    /// Moka cache for storing entries
    cache: MokaCache<CacheKey, CacheEntry>,
    /// Maximum size for this cache in bytes
    max_size: u64,
}

impl MemoryCache {
    /// Create a new memory cache with the specified size limit. Entries
    /// expire from their own metadata; `ttl_seconds` is an upper bound for
    /// every entry and is ignored when zero.
    pub fn new(max_size_bytes: u64, ttl_seconds: u64) -> Self {
        if max_size_bytes == 0 {
            panic!("Memory cache size must be greater than zero");
        }

        // Size based eviction
        let mut builder = MokaCache::builder()
            .weigher(|_k, v: &CacheEntry| v.data.len().try_into().unwrap_or(u32::MAX))
            .max_capacity(max_size_bytes);

        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        let cache = builder.build();

        debug!(
            max_size = max_size_bytes,
            ttl_seconds = ttl_seconds,
            "Memory cache created with size limit and TTL"
        );

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait::async_trait]
impl CacheProvider for MemoryCache {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn get(&self, key: &CacheKey) -> CacheLookupResult {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };

        if let Some(expires_at) = entry.metadata.expires_at {
            if unix_now() >= expires_at {
                debug!(key = %key.key, "Memory cache entry expired");
                self.cache.invalidate(key).await;
                return Ok(Some((entry.data, entry.metadata, CacheStatus::Expired)));
            }
        }

        Ok(Some((entry.data, entry.metadata, CacheStatus::Hit)))
    }

    async fn put(&self, key: CacheKey, data: Bytes, metadata: CacheMetadata) -> CacheResult<()> {
        let size = metadata.size;

        // A single entry shouldn't be larger than the total cache size
        if size > self.max_size {
            warn!(
                key = %key.key,
                size = size,
                max_size = self.max_size,
                "Entry too large for memory cache, skipping"
            );
            return Ok(());
        }

        self.cache.insert(key, CacheEntry { data, metadata }).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        if self.cache.remove(key).await.is_some() {
            debug!(key = %key.key, "Removed entry from memory cache");
        }
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.cache.invalidate_all();
        debug!("Memory cache cleared");
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<()> {
        let now = unix_now();
        let expired: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.metadata.expires_at.is_some_and(|at| at <= now))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &expired {
            self.cache.invalidate(key).await;
        }

        self.cache.run_pending_tasks().await;
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Swept expired memory cache entries");
        }
        Ok(())
    }
}
