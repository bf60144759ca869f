use serde::{Deserialize, Serialize};

/// Settings for the metadata enrichment API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub base_url: String,
    /// Minimum spacing between requests, in milliseconds
    pub min_interval_ms: u64,
    /// Attempts per request when the API answers 429
    pub max_attempts: u32,
    /// Base backoff, doubled on every retry
    pub backoff_ms: u64,
    pub cache_ttl_secs: u64,
    /// Maximum number of cached responses
    pub cache_capacity: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jikan.moe/v4".to_string(),
            min_interval_ms: 334,
            max_attempts: 3,
            backoff_ms: 1000,
            cache_ttl_secs: 3600,
            cache_capacity: 1000,
        }
    }
}
