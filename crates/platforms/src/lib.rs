//! # Platforms parser
//!
//! Resolves playable streams for an episode across several providers.
//!
//! - Provider extractors declared in configuration (`page`, `ajax`, `encoded`, `gated`)
//! - Quality normalization and ranking of stream candidates
//! - Aggregation of all providers with deduplication
//! - Cache-aside resolution backed by `strev-cache`
//! - Batch fetch gateway and title metadata enrichment

pub mod aggregator;
pub mod enrichment;
pub mod extractor;
pub mod gateway;
pub mod media;
pub mod resolver;

pub use aggregator::Aggregator;
pub use enrichment::{EnrichmentClient, EnrichmentConfig, EnrichmentError};
pub use extractor::{
    ExtractorError, ExtractorFactory, ProviderConfig, ProviderKind, ProviderSelection,
};
pub use gateway::{BatchGateway, FetchResult, GatewayError};
pub use media::{EpisodeId, EpisodeStreams, QualityLabel, StreamCandidate};
pub use resolver::{ResolvedStreams, StreamResolver};
