//! # Cache Manager
//!
//! Coordinates the two cache tiers. The key/value store is authoritative and
//! addressed by structured keys; the edge tier is a process-local speedup
//! addressed by request URL. Lookups consult the store first when one is
//! configured. Writes never block the caller: they run as tracked detached
//! tasks and failures are logged.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::providers::{CacheProvider, FileCache, MemoryCache};
use crate::types::{
    CacheCategory, CacheConfig, CacheKey, CacheMetadata, CacheResult, CacheStatus, CacheTier,
    StoreKind,
};

/// Addresses of one cacheable resource in both tiers.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub category: CacheCategory,
    /// Structured key in the key/value store, e.g. `stream:ap:foo-episode-1`
    pub store_key: Option<String>,
    /// Full request URL for the edge tier
    pub edge_key: Option<String>,
}

impl CacheRequest {
    pub fn new(category: CacheCategory) -> Self {
        Self {
            category,
            store_key: None,
            edge_key: None,
        }
    }

    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    pub fn with_edge_key(mut self, url: impl Into<String>) -> Self {
        self.edge_key = Some(url.into());
        self
    }

    fn store_cache_key(&self) -> Option<CacheKey> {
        self.store_key
            .as_ref()
            .map(|key| CacheKey::new(self.category, key.clone()))
    }

    fn edge_cache_key(&self) -> Option<CacheKey> {
        self.edge_key
            .as_ref()
            .map(|url| CacheKey::new(self.category, url.clone()))
    }
}

/// Value produced by a fetch on cache miss.
#[derive(Debug, Clone)]
pub struct CacheFill {
    pub data: Bytes,
    pub content_type: Option<String>,
    /// Only successful results are written back
    pub cacheable: bool,
}

impl CacheFill {
    pub fn store(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            cacheable: true,
        }
    }

    pub fn bypass(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            cacheable: false,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Result of [`CacheManager::get_or_fetch`].
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub status: CacheStatus,
    /// Tier that answered, `None` on a miss
    pub tier: Option<CacheTier>,
    /// Seconds a downstream cache may keep this response
    pub max_age: u64,
}

/// Cache manager handling the key/value store and the edge tier
#[derive(Clone)]
pub struct CacheManager {
    store: Option<Arc<dyn CacheProvider>>,
    edge: Arc<MemoryCache>,
    config: Arc<CacheConfig>,
    pending: TaskTracker,
}

impl CacheManager {
    /// Create a new cache manager with the specified configuration
    pub async fn new(mut config: CacheConfig) -> io::Result<Self> {
        config.validate()?;
        let store: Option<Arc<dyn CacheProvider>> = match config.store {
            StoreKind::None => None,
            StoreKind::Memory => Some(Arc::new(MemoryCache::new(config.max_store_size, 0))),
            StoreKind::File => {
                let dir = config
                    .disk_cache_path
                    .get_or_insert_with(|| std::env::temp_dir().join("strev-cache"))
                    .clone();
                let file_cache = FileCache::new(dir);
                if config.enabled {
                    file_cache.ensure_initialized().await?;
                }
                Some(Arc::new(file_cache))
            }
        };

        Ok(Self::with_store(store, config))
    }

    /// Create a manager around an externally provided key/value store.
    pub fn with_store(store: Option<Arc<dyn CacheProvider>>, config: CacheConfig) -> Self {
        let edge = Arc::new(MemoryCache::new(config.max_edge_size, 0));
        Self {
            store,
            edge,
            config: Arc::new(config),
            pending: TaskTracker::new(),
        }
    }

    /// Get configuration reference
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Look a resource up, key/value store first, then the edge tier.
    pub async fn lookup(&self, request: &CacheRequest) -> Option<CachedValue> {
        if !self.config.enabled {
            return None;
        }

        if let (Some(store), Some(key)) = (&self.store, request.store_cache_key()) {
            match store.get(&key).await {
                Ok(Some((data, metadata, CacheStatus::Hit))) => {
                    debug!(key = %key.key, "Key/value store hit");
                    self.backfill_edge(request, &data, &metadata);
                    return Some(CachedValue {
                        data,
                        content_type: metadata.content_type.clone(),
                        status: CacheStatus::Hit,
                        tier: Some(CacheTier::Store),
                        max_age: metadata.remaining_ttl(),
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key.key, error = %e, "Key/value store lookup failed"),
            }
        }

        if let Some(key) = request.edge_cache_key() {
            match self.edge.get(&key).await {
                Ok(Some((data, metadata, CacheStatus::Hit))) => {
                    debug!(url = %key.key, "Edge cache hit");
                    return Some(CachedValue {
                        data,
                        content_type: metadata.content_type.clone(),
                        status: CacheStatus::Hit,
                        tier: Some(CacheTier::Edge),
                        max_age: metadata.remaining_ttl(),
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(url = %key.key, error = %e, "Edge cache lookup failed"),
            }
        }

        None
    }

    /// Cache-aside: return the cached value, or run `fetch` and write its
    /// result back to both tiers without waiting for the writes.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        request: &CacheRequest,
        fetch: F,
    ) -> Result<CachedValue, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheFill, E>>,
    {
        if let Some(hit) = self.lookup(request).await {
            return Ok(hit);
        }

        let fill = fetch().await?;
        if fill.cacheable {
            self.put(request, fill.data.clone(), fill.content_type.clone());
        }

        Ok(CachedValue {
            data: fill.data,
            content_type: fill.content_type,
            status: CacheStatus::Miss,
            tier: None,
            max_age: request.category.ttl().as_secs(),
        })
    }

    /// Fire-and-forget write to both tiers.
    pub fn put(&self, request: &CacheRequest, data: Bytes, content_type: Option<String>) {
        if !self.config.enabled {
            return;
        }

        let metadata = CacheMetadata::new(data.len() as u64)
            .with_category(request.category)
            .with_content_type_option(content_type);

        if let (Some(store), Some(key)) = (self.store.clone(), request.store_cache_key()) {
            let data = data.clone();
            let metadata = metadata.clone();
            self.pending.spawn(async move {
                let label = key.key.clone();
                if let Err(e) = store.put(key, data, metadata).await {
                    warn!(key = %label, error = %e, "Key/value store write failed");
                }
            });
        }

        if let Some(key) = request.edge_cache_key() {
            self.spawn_edge_put(key, data, metadata);
        }
    }

    fn backfill_edge(&self, request: &CacheRequest, data: &Bytes, metadata: &CacheMetadata) {
        if let Some(key) = request.edge_cache_key() {
            self.spawn_edge_put(key, data.clone(), metadata.clone());
        }
    }

    fn spawn_edge_put(&self, key: CacheKey, data: Bytes, metadata: CacheMetadata) {
        let edge = self.edge.clone();
        self.pending.spawn(async move {
            let label = key.key.clone();
            if let Err(e) = edge.put(key, data, metadata).await {
                warn!(url = %label, error = %e, "Edge cache write failed");
            }
        });
    }

    /// Wait until every detached write issued so far has finished.
    pub async fn settle(&self) {
        self.pending.close();
        self.pending.wait().await;
        self.pending.reopen();
    }

    /// Clear both tiers
    pub async fn clear(&self) -> CacheResult<()> {
        let edge_result = self.edge.clear().await;
        match &self.store {
            Some(store) => store.clear().await.and(edge_result),
            None => edge_result,
        }
    }

    /// Remove expired entries from both tiers
    pub async fn maintain(&self) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        self.edge.sweep().await?;
        if let Some(store) = &self.store {
            store.sweep().await?;
        }
        Ok(())
    }

    /// Start a background maintenance task
    pub fn start_maintenance_task(
        self: Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.maintain().await {
                    warn!("Cache maintenance error: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn edge_only() -> CacheManager {
        CacheManager::with_store(
            None,
            CacheConfig {
                store: StoreKind::None,
                ..CacheConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_new_rejects_zero_edge_size() {
        let result = CacheManager::new(CacheConfig {
            max_edge_size: 0,
            ..CacheConfig::default()
        })
        .await;
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(io::ErrorKind::InvalidInput)
        );
    }

    #[tokio::test]
    async fn test_miss_then_hit_from_store() {
        let manager = CacheManager::new(CacheConfig::default()).await.unwrap();
        let request = CacheRequest::new(CacheCategory::Stream)
            .with_store_key("stream:ap:x-episode-1");
        let calls = AtomicUsize::new(0);

        let first = manager
            .get_or_fetch(&request, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(CacheFill::store("payload"))
            })
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.max_age, 120);

        manager.settle().await;

        let second = manager
            .get_or_fetch(&request, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(CacheFill::store("other"))
            })
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.tier, Some(CacheTier::Store));
        assert_eq!(second.data, Bytes::from_static(b"payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_edge_tier_keyed_by_url() {
        let manager = edge_only();
        let request = CacheRequest::new(CacheCategory::Catalog)
            .with_edge_key("http://localhost/api/search?q=frieren");

        manager
            .get_or_fetch(&request, || async {
                Ok::<_, Infallible>(CacheFill::store("[]").with_content_type("application/json"))
            })
            .await
            .unwrap();
        manager.settle().await;

        let hit = manager.lookup(&request).await.expect("edge hit");
        assert_eq!(hit.tier, Some(CacheTier::Edge));
        assert_eq!(hit.content_type.as_deref(), Some("application/json"));

        let other = CacheRequest::new(CacheCategory::Catalog)
            .with_edge_key("http://localhost/api/search?q=other");
        assert!(manager.lookup(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_bypass_is_not_written() {
        let manager = CacheManager::new(CacheConfig::default()).await.unwrap();
        let request = CacheRequest::new(CacheCategory::Stream)
            .with_store_key("stream:ap:empty-episode-1")
            .with_edge_key("http://localhost/api/streams/ap/empty-episode-1");

        manager
            .get_or_fetch(&request, || async {
                Ok::<_, Infallible>(CacheFill::bypass("no streams"))
            })
            .await
            .unwrap();
        manager.settle().await;

        assert!(manager.lookup(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_store_hit_backfills_edge() {
        let manager = CacheManager::new(CacheConfig::default()).await.unwrap();
        let stored = CacheRequest::new(CacheCategory::Stream)
            .with_store_key("stream:ap:b-episode-2");
        manager.put(&stored, Bytes::from_static(b"v"), None);
        manager.settle().await;

        let with_url = stored.clone().with_edge_key("http://localhost/api/streams/ap/b-episode-2");
        let hit = manager.lookup(&with_url).await.expect("store hit");
        assert_eq!(hit.tier, Some(CacheTier::Store));
        manager.settle().await;

        let edge_only = CacheRequest::new(CacheCategory::Stream)
            .with_edge_key("http://localhost/api/streams/ap/b-episode-2");
        let hit = manager.lookup(&edge_only).await.expect("edge backfilled");
        assert_eq!(hit.tier, Some(CacheTier::Edge));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let manager = CacheManager::with_store(
            None,
            CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
        );
        let request = CacheRequest::new(CacheCategory::Api).with_edge_key("http://localhost/x");
        manager.put(&request, Bytes::from_static(b"v"), None);
        manager.settle().await;
        assert!(manager.lookup(&request).await.is_none());
    }
}
