use std::sync::Arc;

use tracing::debug;

use crate::extractor::{
    default::HttpClients,
    error::ExtractorError,
    platform_extractor::{Extractor, PlatformExtractor},
    platforms::build_candidates,
    provider::ProviderConfig,
    raw_status::detect_raw,
    strategies::extract_candidates,
};
use crate::media::{EpisodeId, StreamCandidate};

/// Provider whose episode page embeds the media URLs directly.
pub struct PageExtractor {
    pub extractor: Extractor,
}

impl PageExtractor {
    pub fn new(provider: Arc<ProviderConfig>, clients: &HttpClients) -> Self {
        Self {
            extractor: Extractor::new(provider, clients.client.clone()),
        }
    }
}

#[async_trait::async_trait]
impl PlatformExtractor for PageExtractor {
    fn get_extractor(&self) -> &Extractor {
        &self.extractor
    }

    async fn extract(&self, episode: &EpisodeId) -> Result<Vec<StreamCandidate>, ExtractorError> {
        let url = self.extractor.provider.episode_url(episode);
        debug!("Fetching episode page: {}", url);

        let page = self.extractor.fetch_page(&url).await?;
        let raws = extract_candidates(&page.body);
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let is_raw = detect_raw(&self.extractor, episode).await;
        Ok(build_candidates(self.code(), raws, is_raw, &page.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::platforms::test_support::{clients, init_tracing, provider};
    use crate::extractor::provider::ProviderKind;
    use crate::media::QualityLabel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EPISODE_PAGE: &str = r#"<html><script>
        var player = { sources: [
            {'file': 'https://cdn.example/frieren/3/1080.m3u8', 'label': '1080p'},
            {'file': 'https://cdn.example/frieren/3/480.m3u8', 'label': '480p'},
        ] };
    </script></html>"#;

    fn page_provider(server: &MockServer) -> Arc<ProviderConfig> {
        let mut config = ProviderConfig::new("pg", "Page", ProviderKind::Page, server.uri());
        config.series_path = Some("/series/{series}/".to_string());
        config.raw_marker = Some("raw".to_string());
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_raw_marker_applies_to_every_candidate() {
        init_tracing();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frieren-episode-3/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EPISODE_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/series/frieren/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="/frieren-episode-3/">3</a><i class="tag raw"></i>"#,
            ))
            .mount(&server)
            .await;

        let extractor = PageExtractor::new(page_provider(&server), &clients());
        let episode = EpisodeId::parse("frieren-episode-3").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.error.is_none());
        assert_eq!(result.streams.len(), 2);
        assert!(result.streams.iter().all(|s| s.is_raw));
        assert_eq!(result.streams[0].quality, QualityLabel::P1080);
        assert_eq!(
            result.streams[0].referer.as_deref(),
            Some(format!("{}/frieren-episode-3/", server.uri()).as_str())
        );
    }

    #[tokio::test]
    async fn test_listing_failure_means_not_raw() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frieren-episode-3/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EPISODE_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/series/frieren/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let extractor = PageExtractor::new(page_provider(&server), &clients());
        let episode = EpisodeId::parse("frieren-episode-3").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.error.is_none());
        assert_eq!(result.streams.len(), 2);
        assert!(result.streams.iter().all(|s| !s.is_raw));
    }

    #[tokio::test]
    async fn test_not_found_is_empty_without_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = PageExtractor::new(
            provider("pg", ProviderKind::Page, &server.uri()),
            &clients(),
        );
        let episode = EpisodeId::parse("frieren-episode-99").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.streams.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let extractor = PageExtractor::new(
            provider("pg", ProviderKind::Page, &server.uri()),
            &clients(),
        );
        let episode = EpisodeId::parse("frieren-episode-1").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.streams.is_empty());
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_non_fatal() {
        // Nothing listens on port 9 locally
        let extractor = PageExtractor::new(
            provider("pg", ProviderKind::Page, "http://127.0.0.1:9"),
            &clients(),
        );
        let episode = EpisodeId::parse("frieren-episode-1").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.streams.is_empty());
        assert!(result.error.is_some());
    }
}
