use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use regex::Regex;
use tracing::debug;

use crate::extractor::{
    default::HttpClients,
    error::ExtractorError,
    platform_extractor::{Extractor, PlatformExtractor},
    platforms::build_candidates,
    provider::ProviderConfig,
    raw_status::detect_raw,
    strategies::{CandidateSet, RawCandidate, extract_candidates},
};
use crate::media::{EpisodeId, StreamCandidate};

/// Decode a base64 parameter, tolerating URL-safe alphabets, missing
/// padding and percent-encoding.
pub fn decode_param(value: &str) -> Option<String> {
    let value = urlencoding::decode(value).ok()?;
    let value = value.trim();
    let bytes = [&STANDARD, &URL_SAFE, &STANDARD_NO_PAD, &URL_SAFE_NO_PAD]
        .into_iter()
        .find_map(|engine| engine.decode(value).ok())?;
    let decoded = String::from_utf8(bytes).ok()?;
    let decoded = decoded.trim();

    // Anything that is not path-like is noise
    if decoded.is_empty() || !(decoded.contains('/') || decoded.contains('.')) {
        return None;
    }
    if decoded.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }
    Some(decoded.to_string())
}

/// Quality implied by a decoded media path.
pub fn encoded_quality(path: &str) -> &'static str {
    ["1080p", "720p", "480p"]
        .into_iter()
        .find(|q| path.contains(q))
        .unwrap_or("SD")
}

/// Provider whose page links carry the media path base64-encoded in a query
/// parameter.
pub struct EncodedExtractor {
    pub extractor: Extractor,
    param_regex: Option<Regex>,
}

impl EncodedExtractor {
    pub fn new(provider: Arc<ProviderConfig>, clients: &HttpClients) -> Self {
        let param_regex = provider.encoded_param.as_deref().and_then(|param| {
            Regex::new(&format!(
                r#"[?&](?:amp;)?{}=([^&"'\s<>#]+)"#,
                regex::escape(param)
            ))
            .ok()
        });
        Self {
            extractor: Extractor::new(provider, clients.client.clone()),
            param_regex,
        }
    }

    fn decode_links(&self, html: &str) -> Result<Vec<RawCandidate>, ExtractorError> {
        let regex = self.param_regex.as_ref().ok_or_else(|| {
            ExtractorError::ValidationError(format!(
                "provider '{}' has no encoded_param",
                self.extractor.provider.code
            ))
        })?;

        let media_base = self.extractor.provider.media_base();
        let mut set = CandidateSet::new();
        for caps in regex.captures_iter(html) {
            let Some(path) = decode_param(&caps[1]) else {
                debug!(value = &caps[1], "Undecodable parameter");
                continue;
            };
            let url = ProviderConfig::join(media_base, &path);
            let label = encoded_quality(&path).to_string();
            set.push(RawCandidate::new(url, Some(label)));
        }
        Ok(set.into_vec())
    }
}

#[async_trait::async_trait]
impl PlatformExtractor for EncodedExtractor {
    fn get_extractor(&self) -> &Extractor {
        &self.extractor
    }

    async fn extract(&self, episode: &EpisodeId) -> Result<Vec<StreamCandidate>, ExtractorError> {
        let url = self.extractor.provider.episode_url(episode);
        let page = self.extractor.fetch_page(&url).await?;

        let mut raws = self.decode_links(&page.body)?;
        if raws.is_empty() {
            debug!("No encoded links, falling back to page strategies");
            raws = extract_candidates(&page.body);
        }
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
    use crate::extractor::platforms::test_support::clients;
    use crate::extractor::provider::ProviderKind;
    use crate::media::QualityLabel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_param_variants() {
        let encoded = STANDARD.encode("/media/frieren/03-1080p.mp4");
        assert_eq!(
            decode_param(&encoded).as_deref(),
            Some("/media/frieren/03-1080p.mp4")
        );

        let no_pad = STANDARD_NO_PAD.encode("/media/a.mp4");
        assert_eq!(decode_param(&no_pad).as_deref(), Some("/media/a.mp4"));

        let percent = urlencoding::encode(&STANDARD.encode("/m/x?y=1.mp4")).into_owned();
        assert_eq!(decode_param(&percent).as_deref(), Some("/m/x?y=1.mp4"));

        assert_eq!(decode_param("!!!"), None);
        assert_eq!(decode_param(&STANDARD.encode("hello")), None);
    }

    #[test]
    fn test_encoded_quality() {
        assert_eq!(encoded_quality("/a/ep-720p.mp4"), "720p");
        assert_eq!(encoded_quality("/a/ep.mp4"), "SD");
    }

    #[tokio::test]
    async fn test_encoded_links_resolve_against_media_base() {
        let server = MockServer::start().await;
        let hd = STANDARD.encode("/v/frieren/03/1080p.mp4");
        let sd = STANDARD.encode("/v/frieren/03/index.mp4");
        let body = format!(
            r#"<a href="/play?id={hd}">HD</a> <a href="/play?x=1&amp;id={sd}">SD</a> <a href="/play?id={hd}">again</a>"#
        );
        Mock::given(method("GET"))
            .and(path("/watch/frieren/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let mut config = ProviderConfig::new("en", "Encoded", ProviderKind::Encoded, server.uri());
        config.episode_path = "/watch/{series}/{episode}".to_string();
        config.encoded_param = Some("id".to_string());
        config.media_base = Some("https://media.example".to_string());
        let extractor = EncodedExtractor::new(Arc::new(config), &clients());

        let episode = EpisodeId::parse("frieren-episode-3").unwrap();
        let result = extractor.resolve(&episode).await;

        assert!(result.error.is_none());
        assert_eq!(result.streams.len(), 2);
        assert_eq!(result.streams[0].url, "https://media.example/v/frieren/03/1080p.mp4");
        assert_eq!(result.streams[0].quality, QualityLabel::P1080);
        assert_eq!(result.streams[1].quality, QualityLabel::Unknown);
    }
}
