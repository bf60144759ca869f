//! # Cache System
//!
//! Cache-aside layer for resolved streams and HTTP responses. Two tiers with
//! independent lifecycles: a key/value store addressed by structured keys and
//! an edge cache addressed by request URL. Entry lifetimes come from a fixed
//! category table.

mod manager;
pub mod providers;
mod types;

pub use manager::{CacheFill, CacheManager, CacheRequest, CachedValue};
pub use types::{
    CacheCategory, CacheConfig, CacheKey, CacheLookupResult, CacheMetadata, CacheResult,
    CacheStatus, CacheTier, StoreKind,
};

pub use providers::{CacheProvider, FileCache, MemoryCache};
