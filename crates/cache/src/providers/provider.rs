//! # Cache Provider
//!
//! The key/value store contract. The stream resolver only needs `get` and
//! `put`; the remaining operations back CLI maintenance and the periodic
//! sweep.

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{CacheKey, CacheLookupResult, CacheMetadata, CacheResult};

/// A trait for cache providers that can store and retrieve cached data
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Check if the cache contains an entry for the given key
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Get an entry from the cache
    async fn get(&self, key: &CacheKey) -> CacheLookupResult;

    /// Put an entry into the cache. Writes are idempotent: the same key
    /// always carries the same or a refreshed value.
    async fn put(&self, key: CacheKey, data: Bytes, metadata: CacheMetadata) -> CacheResult<()>;

    /// Remove an entry from the cache
    async fn remove(&self, key: &CacheKey) -> CacheResult<()>;

    /// Clear all entries from the cache
    async fn clear(&self) -> CacheResult<()>;

    /// Remove expired entries from the cache
    async fn sweep(&self) -> CacheResult<()>;
}
