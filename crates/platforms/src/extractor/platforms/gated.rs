use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::{Client, Method};
use tracing::{debug, info};

use crate::extractor::{
    default::HttpClients,
    error::ExtractorError,
    platform_extractor::{Extractor, PlatformExtractor},
    platforms::build_candidates,
    provider::ProviderConfig,
    raw_status::detect_raw,
    strategies::{RawCandidate, extract_candidates},
};
use crate::media::{EpisodeId, StreamCandidate};

/// Provider that may answer the episode page with a redirect to an
/// interstitial. The page is fetched without following redirects; on a 3xx a
/// media URL is synthesized from `media_template` and flagged low confidence.
pub struct GatedExtractor {
    pub extractor: Extractor,
    no_redirect: Client,
}

impl GatedExtractor {
    pub fn new(provider: Arc<ProviderConfig>, clients: &HttpClients) -> Self {
        Self {
            extractor: Extractor::new(provider, clients.client.clone()),
            no_redirect: clients.no_redirect.clone(),
        }
    }

    fn synthesize(
        &self,
        episode: &EpisodeId,
        location: &str,
    ) -> Result<RawCandidate, ExtractorError> {
        let provider = &self.extractor.provider;
        let template = provider.media_template.as_deref().ok_or_else(|| {
            ExtractorError::Other(format!("interstitial redirect to {location}"))
        })?;
        let url = ProviderConfig::join(
            provider.media_base(),
            &ProviderConfig::fill_template(template, episode),
        );
        Ok(RawCandidate::new(url, None))
    }
}

#[async_trait::async_trait]
impl PlatformExtractor for GatedExtractor {
    fn get_extractor(&self) -> &Extractor {
        &self.extractor
    }

    async fn extract(&self, episode: &EpisodeId) -> Result<Vec<StreamCandidate>, ExtractorError> {
        let url = self.extractor.provider.episode_url(episode);
        let response = self
            .extractor
            .request(&self.no_redirect, Method::GET, &url)
            .send()
            .await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            info!(
                provider = %self.code(),
                status = response.status().as_u16(),
                %location,
                "Interstitial detected"
            );

            let raw = self.synthesize(episode, &location)?;
            let is_raw = detect_raw(&self.extractor, episode).await;
            let note = format!(
                "Episode page redirected to an interstitial ({location}); URL synthesized from template and not verified"
            );
            return Ok(build_candidates(self.code(), vec![raw], is_raw, &url)
                .into_iter()
                .map(|c| c.with_low_confidence(note.clone()))
                .collect());
        }

        let page = Extractor::read_page(&url, response).await?;
        let raws = extract_candidates(&page.body);
        debug!(count = raws.len(), "Gated page served directly");
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let is_raw = detect_raw(&self.extractor, episode).await;
        Ok(build_candidates(self.code(), raws, is_raw, &page.url))
    }
}
