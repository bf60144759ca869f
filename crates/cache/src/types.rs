//! # Cache Types
//!
//! This module defines common types used across the caching system.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Status of a cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Resource found in cache and is valid
    Hit,
    /// Resource not found in cache
    Miss,
    /// Resource found but has expired
    Expired,
}

impl CacheStatus {
    /// Value used for the `X-Cache-Status` response marker.
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss | CacheStatus::Expired => "MISS",
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit)
    }
}

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// The shared key/value store, addressed by structured keys
    Store,
    /// The process-local edge cache, addressed by request URL
    Edge,
}

/// Resource categories. The TTL of an entry is selected from this table and
/// never from a caller-supplied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Manifest / index metadata
    Manifest,
    /// Catalog listings and search results
    Catalog,
    /// Per-title metadata
    TitleMeta,
    /// Resolved stream lists
    Stream,
    /// Static assets
    Static,
    /// Anything else served by the API
    Api,
}

impl CacheCategory {
    pub const fn ttl(&self) -> Duration {
        match self {
            CacheCategory::Manifest => Duration::from_secs(300),
            CacheCategory::Catalog => Duration::from_secs(300),
            CacheCategory::TitleMeta => Duration::from_secs(3600),
            CacheCategory::Stream => Duration::from_secs(120),
            CacheCategory::Static => Duration::from_secs(86400),
            CacheCategory::Api => Duration::from_secs(300),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Manifest => "manifest",
            CacheCategory::Catalog => "catalog",
            CacheCategory::TitleMeta => "title_meta",
            CacheCategory::Stream => "stream",
            CacheCategory::Static => "static",
            CacheCategory::Api => "api",
        }
    }

    /// Classify a request path into a category.
    pub fn from_path(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        if path.ends_with("manifest.json") || path.ends_with("/index.json") {
            CacheCategory::Manifest
        } else if path.starts_with("/static/")
            || path.starts_with("/assets/")
            || [".css", ".js", ".png", ".jpg", ".svg", ".ico", ".woff2"]
                .iter()
                .any(|ext| path.ends_with(ext))
        {
            CacheCategory::Static
        } else if path.starts_with("/api/streams/") || path.starts_with("/stream/") {
            CacheCategory::Stream
        } else if path.starts_with("/api/titles/") || path.starts_with("/meta/") {
            CacheCategory::TitleMeta
        } else if path.starts_with("/api/search") || path.starts_with("/catalog/") {
            CacheCategory::Catalog
        } else {
            CacheCategory::Api
        }
    }
}

/// Cache key for identifying resources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Category of the resource, drives the TTL
    pub category: CacheCategory,
    /// Structured key (`stream:<provider>:<episode>`) or a full request URL
    pub key: String,
}

impl CacheKey {
    pub fn new(category: CacheCategory, key: impl Into<String>) -> Self {
        Self {
            category,
            key: key.into(),
        }
    }

    /// Key for a resolved stream list of one provider (or `all`).
    pub fn stream(provider: &str, episode_id: &str) -> Self {
        Self::new(
            CacheCategory::Stream,
            format!("stream:{provider}:{episode_id}"),
        )
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.category.as_str());
        hasher.update(":");
        hasher.update(&self.key);

        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

/// Metadata for a cached resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the resource was cached
    pub cached_at: u64,
    /// When the resource expires
    pub expires_at: Option<u64>,
    /// Content type of the resource
    pub content_type: Option<String>,
    /// Size of the cached resource in bytes
    pub size: u64,
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CacheMetadata {
    /// Create new metadata for a resource
    pub fn new(size: u64) -> Self {
        Self {
            cached_at: unix_now(),
            expires_at: None,
            content_type: None,
            size,
        }
    }

    /// Set the expiration time
    pub fn with_expiration(mut self, duration: Duration) -> Self {
        self.expires_at = Some(self.cached_at + duration.as_secs());
        self
    }

    /// Set the expiration time from the category table
    pub fn with_category(self, category: CacheCategory) -> Self {
        self.with_expiration(category.ttl())
    }

    /// Set the content type as an Option
    pub fn with_content_type_option(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Seconds the entry has left, zero once expired.
    pub fn remaining_ttl(&self) -> u64 {
        self.expires_at
            .map(|expires_at| expires_at.saturating_sub(unix_now()))
            .unwrap_or(0)
    }

    /// Check if the resource has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= unix_now(),
            None => false,
        }
    }
}

/// Which implementation backs the key/value store tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// No key/value store; only the edge tier is used
    None,
    /// In-memory store shared by the process
    #[default]
    Memory,
    /// Persistent store on disk
    File,
}

/// Configuration for the cache system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Backing implementation of the key/value store
    pub store: StoreKind,
    /// Path for disk cache storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_cache_path: Option<PathBuf>,
    /// Maximum size of the in-memory key/value store in bytes
    pub max_store_size: u64,
    /// Maximum size of the edge cache in bytes
    pub max_edge_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: StoreKind::Memory,
            disk_cache_path: None, // If None, we'll use system temp dir
            max_store_size: 64 * 1024 * 1024, // 64MB
            max_edge_size: 16 * 1024 * 1024,  // 16MB
        }
    }
}

impl CacheConfig {
    /// Memory tiers need a non-zero capacity.
    pub fn validate(&self) -> CacheResult<()> {
        if self.store == StoreKind::Memory && self.max_store_size == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "max_store_size must be greater than zero",
            ));
        }
        if self.max_edge_size == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "max_edge_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

/// A type representing the result of a cache lookup operation
pub type CacheLookupResult = CacheResult<Option<(Bytes, CacheMetadata, CacheStatus)>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_zero_sizes() {
        assert!(CacheConfig::default().validate().is_ok());

        let no_edge = CacheConfig {
            max_edge_size: 0,
            ..CacheConfig::default()
        };
        assert!(no_edge.validate().is_err());

        let no_store = CacheConfig {
            max_store_size: 0,
            ..CacheConfig::default()
        };
        assert!(no_store.validate().is_err());

        // The store size only matters for the memory store
        let file = CacheConfig {
            store: StoreKind::File,
            max_store_size: 0,
            ..CacheConfig::default()
        };
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(CacheCategory::Manifest.ttl().as_secs(), 300);
        assert_eq!(CacheCategory::Catalog.ttl().as_secs(), 300);
        assert_eq!(CacheCategory::TitleMeta.ttl().as_secs(), 3600);
        assert_eq!(CacheCategory::Static.ttl().as_secs(), 86400);
        assert_eq!(CacheCategory::Api.ttl().as_secs(), 300);

        let stream = CacheCategory::Stream.ttl().as_secs();
        assert!((60..=180).contains(&stream));
    }

    #[test]
    fn test_category_from_path() {
        assert_eq!(
            CacheCategory::from_path("/manifest.json"),
            CacheCategory::Manifest
        );
        assert_eq!(
            CacheCategory::from_path("/api/streams/ap/foo-episode-1"),
            CacheCategory::Stream
        );
        assert_eq!(
            CacheCategory::from_path("/api/titles/52991"),
            CacheCategory::TitleMeta
        );
        assert_eq!(
            CacheCategory::from_path("/api/search"),
            CacheCategory::Catalog
        );
        assert_eq!(
            CacheCategory::from_path("/static/logo.png"),
            CacheCategory::Static
        );
        assert_eq!(CacheCategory::from_path("/api/fetch"), CacheCategory::Api);
    }

    #[test]
    fn test_stream_key_format() {
        let key = CacheKey::stream("ap", "some-series-episode-3");
        assert_eq!(key.key, "stream:ap:some-series-episode-3");
        assert_eq!(key.category, CacheCategory::Stream);
    }

    #[test]
    fn test_filename_is_stable_and_distinct() {
        let a = CacheKey::stream("ap", "x-episode-1");
        let b = CacheKey::stream("ap", "x-episode-2");
        assert_eq!(a.to_filename(), a.clone().to_filename());
        assert_ne!(a.to_filename(), b.to_filename());
    }

    #[test]
    fn test_metadata_expiry() {
        let fresh = CacheMetadata::new(10).with_category(CacheCategory::Stream);
        assert!(!fresh.is_expired());
        assert!(fresh.remaining_ttl() > 0);

        let mut stale = CacheMetadata::new(10);
        stale.expires_at = Some(stale.cached_at.saturating_sub(1));
        assert!(stale.is_expired());
        assert_eq!(stale.remaining_ttl(), 0);
    }
}
