//! Cache-aside stream resolution.
//!
//! Results are cached under `stream:<provider-code>:<episode-id>` in the
//! key/value store and, when the caller supplies its request URL, in the edge
//! tier. Only results with at least one stream are written back.

use std::sync::Arc;

use strev_cache::{CacheCategory, CacheFill, CacheKey, CacheManager, CacheRequest, CacheStatus};
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::extractor::{ExtractorError, ProviderSelection};
use crate::media::{EpisodeId, EpisodeStreams};

/// Resolution outcome plus cache bookkeeping for response headers.
#[derive(Debug, Clone)]
pub struct ResolvedStreams {
    pub streams: EpisodeStreams,
    pub cache_status: CacheStatus,
    /// Seconds downstream caches may keep the result
    pub max_age: u64,
}

pub struct StreamResolver {
    aggregator: Arc<Aggregator>,
    cache: Option<Arc<CacheManager>>,
}

impl StreamResolver {
    pub fn new(aggregator: Arc<Aggregator>, cache: Option<Arc<CacheManager>>) -> Self {
        Self { aggregator, cache }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn cache_key(episode: &EpisodeId, selection: &ProviderSelection) -> String {
        CacheKey::stream(&selection.cache_code(), &episode.to_string()).key
    }

    pub async fn resolve(
        &self,
        episode: &EpisodeId,
        selection: &ProviderSelection,
        edge_key: Option<&str>,
    ) -> Result<ResolvedStreams, ExtractorError> {
        let Some(cache) = &self.cache else {
            let streams = self.aggregator.resolve(episode, selection).await?;
            return Ok(ResolvedStreams {
                streams,
                cache_status: CacheStatus::Miss,
                max_age: CacheCategory::Stream.ttl().as_secs(),
            });
        };

        let mut request = CacheRequest::new(CacheCategory::Stream)
            .with_store_key(Self::cache_key(episode, selection));
        if let Some(url) = edge_key {
            request = request.with_edge_key(url);
        }

        let cached = cache
            .get_or_fetch(&request, || async {
                let streams = self.aggregator.resolve(episode, selection).await?;
                let data = serde_json::to_vec(&streams)?;
                let fill = if streams.has_streams() {
                    CacheFill::store(data)
                } else {
                    CacheFill::bypass(data)
                };
                Ok::<_, ExtractorError>(fill.with_content_type("application/json"))
            })
            .await?;

        match serde_json::from_slice::<EpisodeStreams>(&cached.data) {
            Ok(streams) => {
                debug!(
                    episode = %episode,
                    status = cached.status.as_header_value(),
                    "Stream lookup"
                );
                Ok(ResolvedStreams {
                    streams,
                    cache_status: cached.status,
                    max_age: cached.max_age,
                })
            }
            Err(e) => {
                warn!(episode = %episode, error = %e, "Discarding unreadable cache entry");
                let streams = self.aggregator.resolve(episode, selection).await?;
                Ok(ResolvedStreams {
                    streams,
                    cache_status: CacheStatus::Miss,
                    max_age: CacheCategory::Stream.ttl().as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::platforms::test_support::clients;
    use crate::extractor::{ExtractorFactory, ProviderConfig, ProviderKind};
    use crate::media::ResolutionStatus;
    use strev_cache::{CacheConfig, CacheProvider, MemoryCache, StoreKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer, cache: Arc<CacheManager>) -> StreamResolver {
        let factory = ExtractorFactory::new(
            clients(),
            vec![ProviderConfig::new("pa", "A", ProviderKind::Page, server.uri())],
        );
        StreamResolver::new(Arc::new(Aggregator::new(Arc::new(factory))), Some(cache))
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frieren-episode-5/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"file: "https://cdn.example/frieren/5-1080p.m3u8""#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCache::new(1024 * 1024, 0));
        let cache = Arc::new(CacheManager::with_store(
            Some(store.clone() as Arc<dyn CacheProvider>),
            CacheConfig::default(),
        ));
        let resolver = resolver(&server, cache.clone());
        let episode = EpisodeId::parse("frieren-episode-5").unwrap();
        let selection = ProviderSelection::Only(vec!["pa".into()]);

        let first = resolver.resolve(&episode, &selection, None).await.unwrap();
        assert_eq!(first.cache_status, CacheStatus::Miss);
        assert_eq!(first.max_age, 120);
        assert_eq!(first.streams.streams.len(), 1);

        cache.settle().await;
        let key = CacheKey::stream("pa", "frieren-episode-5");
        assert!(store.contains(&key).await.unwrap());

        let second = resolver.resolve(&episode, &selection, None).await.unwrap();
        assert_eq!(second.cache_status, CacheStatus::Hit);
        assert_eq!(second.streams, first.streams);
        // MockServer verifies the single upstream fetch on drop
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>soon</p>"))
            .expect(2)
            .mount(&server)
            .await;

        let cache = Arc::new(
            CacheManager::new(CacheConfig {
                store: StoreKind::Memory,
                ..CacheConfig::default()
            })
            .await
            .unwrap(),
        );
        let resolver = resolver(&server, cache.clone());
        let episode = EpisodeId::parse("frieren-episode-6").unwrap();

        for _ in 0..2 {
            let result = resolver
                .resolve(
                    &episode,
                    &ProviderSelection::All,
                    Some("http://edge/api/streams/all/frieren-episode-6"),
                )
                .await
                .unwrap();
            assert_eq!(result.cache_status, CacheStatus::Miss);
            assert_eq!(result.streams.status, ResolutionStatus::NoStreams);
            cache.settle().await;
        }
    }

    #[test]
    fn test_cache_key_format() {
        let episode = EpisodeId::parse("frieren-episode-5").unwrap();
        assert_eq!(
            StreamResolver::cache_key(&episode, &ProviderSelection::All),
            "stream:all:frieren-episode-5"
        );
    }
}
