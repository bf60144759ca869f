//! Fan-out over providers and merge into one ranked list.

use std::sync::Arc;

use futures::future::join_all;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::extractor::{ExtractorError, ExtractorFactory, PlatformExtractor, ProviderSelection};
use crate::media::{EpisodeId, EpisodeStreams, ProviderFailure, ProviderResult, sort_by_quality};

/// Merge provider results in the order given: exact-URL duplicates are
/// dropped (first occurrence wins), the rest is sorted by quality.
pub fn merge_results(episode: &EpisodeId, results: Vec<ProviderResult>) -> EpisodeStreams {
    let mut seen = FxHashSet::default();
    let mut streams = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        if let Some(error) = result.error {
            failures.push(ProviderFailure {
                provider: result.provider.clone(),
                error,
            });
        }
        for stream in result.streams {
            if seen.insert(stream.url.clone()) {
                streams.push(stream);
            } else {
                debug!(provider = %stream.provider, url = %stream.url, "Dropping duplicate URL");
            }
        }
    }

    EpisodeStreams::new(episode.clone(), sort_by_quality(streams), failures)
}

/// Resolve an episode against the given providers concurrently. Provider
/// failures are collected, never propagated.
pub async fn resolve_episode(
    episode: &EpisodeId,
    providers: &[Arc<dyn PlatformExtractor>],
) -> EpisodeStreams {
    resolve_with_rejected(episode, providers, Vec::new()).await
}

async fn resolve_with_rejected(
    episode: &EpisodeId,
    providers: &[Arc<dyn PlatformExtractor>],
    rejected: Vec<ProviderResult>,
) -> EpisodeStreams {
    let mut results = join_all(providers.iter().map(|provider| provider.resolve(episode))).await;
    results.extend(rejected);
    let merged = merge_results(episode, results);
    info!(
        episode = %episode,
        providers = providers.len(),
        streams = merged.streams.len(),
        failures = merged.failures.len(),
        "Episode resolved"
    );
    merged
}

pub struct Aggregator {
    factory: Arc<ExtractorFactory>,
}

impl Aggregator {
    pub fn new(factory: Arc<ExtractorFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ExtractorFactory {
        &self.factory
    }

    /// Fails only when the selection names an unknown provider. Providers
    /// with an invalid configuration show up as failures in the result.
    pub async fn resolve(
        &self,
        episode: &EpisodeId,
        selection: &ProviderSelection,
    ) -> Result<EpisodeStreams, ExtractorError> {
        let selected = self.factory.create_selection(selection)?;
        Ok(resolve_with_rejected(episode, &selected.extractors, selected.rejected).await)
    }
}
