use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::header::REFERER;
use tracing::{debug, warn};

use crate::extractor::{
    default::HttpClients,
    error::ExtractorError,
    platform_extractor::{Extractor, PlatformExtractor},
    platforms::build_candidates,
    provider::ProviderConfig,
    raw_status::detect_raw,
    strategies::{CandidateSet, RawCandidate, extract_candidates, unescape},
};
use crate::media::{EpisodeId, StreamCandidate, StreamFormat};

static PLAYER_OPTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<[^>]*\bdata-nume\s*=\s*["']([^"']+)["'][^>]*>"#).unwrap());

static DATA_POST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdata-post\s*=\s*["'](\d+)["']"#).unwrap());

static DATA_TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdata-type\s*=\s*["'](\w+)["']"#).unwrap());

static POST_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bpostid-|["']?post_id["']?\s*[:=]\s*["']?)(\d+)"#).unwrap()
});

static EMBED_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:embed_url|src|file)["']?\s*[:=]\s*["']?((?:https?:)?//[^"'\s<>]+)"#)
        .unwrap()
});

static ANY_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s<>\\]+"#).unwrap());

/// One entry of the page's player selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOption {
    pub post_id: String,
    pub index: String,
    pub kind: String,
}

/// Player options from markup. Options without their own post id inherit
/// the page-level one.
pub fn parse_player_options(html: &str) -> Vec<PlayerOption> {
    let page_post_id = DATA_POST_REGEX
        .captures(html)
        .or_else(|| POST_ID_REGEX.captures(html))
        .map(|caps| caps[1].to_string());

    PLAYER_OPTION_REGEX
        .captures_iter(html)
        .filter_map(|caps| {
            let tag = caps.get(0)?.as_str();
            let index = caps[1].to_string();
            if index == "trailer" {
                return None;
            }
            let post_id = DATA_POST_REGEX
                .captures(tag)
                .map(|c| c[1].to_string())
                .or_else(|| page_post_id.clone())?;
            let kind = DATA_TYPE_REGEX
                .captures(tag)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| "tv".to_string());
            Some(PlayerOption {
                post_id,
                index,
                kind,
            })
        })
        .collect()
}

/// Nested player URL from an admin-ajax response.
pub fn parse_player_url(body: &str) -> Option<String> {
    let body = unescape(body);
    let url = EMBED_URL_REGEX
        .captures(&body)
        .map(|caps| caps[1].to_string())
        .or_else(|| ANY_URL_REGEX.find(&body).map(|m| m.as_str().to_string()))?;

    Some(match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url,
    })
}

/// Secondary player type, taken from the registrable part of the host.
pub fn proxy_kind(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .and_then(|host| {
            let labels: Vec<&str> = host.trim_start_matches("www.").split('.').collect();
            match labels.len() {
                0 => None,
                1 => Some(labels[0].to_string()),
                n => Some(labels[n - 2].to_string()),
            }
        })
        .filter(|kind| !kind.is_empty())
        .unwrap_or_else(|| "player".to_string())
}

/// Provider whose players are resolved through a WordPress admin-ajax call.
pub struct AjaxExtractor {
    pub extractor: Extractor,
}

impl AjaxExtractor {
    pub fn new(provider: Arc<ProviderConfig>, clients: &HttpClients) -> Self {
        let mut extractor = Extractor::new(provider, clients.client.clone());
        extractor.add_header("X-Requested-With", "XMLHttpRequest");
        Self { extractor }
    }

    async fn fetch_player(
        &self,
        option: &PlayerOption,
        page_url: &str,
    ) -> Result<Option<String>, ExtractorError> {
        let provider = &self.extractor.provider;
        let form = [
            ("action", provider.ajax_action.as_str()),
            ("post", option.post_id.as_str()),
            ("nume", option.index.as_str()),
            ("type", option.kind.as_str()),
        ];

        let response = self
            .extractor
            .post(&provider.ajax_url())
            .header(REFERER, page_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractorError::UpstreamStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let url = parse_player_url(&body);
        debug!(post = %option.post_id, nume = %option.index, url = ?url, "Player lookup");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PlatformExtractor for AjaxExtractor {
    fn get_extractor(&self) -> &Extractor {
        &self.extractor
    }

    async fn extract(&self, episode: &EpisodeId) -> Result<Vec<StreamCandidate>, ExtractorError> {
        let url = self.extractor.provider.episode_url(episode);
        let page = self.extractor.fetch_page(&url).await?;

        let mut direct = CandidateSet::new();
        direct.extend(extract_candidates(&page.body));

        let options = parse_player_options(&page.body);
        debug!(count = options.len(), "Player options found");

        let mut players = Vec::new();
        let mut last_error = None;
        for option in &options {
            match self.fetch_player(option, &page.url).await {
                Ok(Some(player_url)) => players.push(player_url),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        provider = %self.code(),
                        nume = %option.index,
                        error = %e,
                        "Player lookup failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        if direct.is_empty() && players.is_empty() {
            return match last_error {
                Some(e) => Err(e),
                None => Ok(Vec::new()),
            };
        }

        let is_raw = detect_raw(&self.extractor, episode).await;
        let mut streams = build_candidates(self.code(), direct.into_vec(), is_raw, &page.url);

        let mut seen = CandidateSet::new();
        seen.extend(streams.iter().map(|s| RawCandidate::new(s.url.clone(), None)));
        let fresh: Vec<RawCandidate> = players
            .into_iter()
            .map(|url| RawCandidate::new(url, None))
            .filter(|raw| seen.push(raw.clone()))
            .collect();

        for mut stream in build_candidates(self.code(), fresh, is_raw, &page.url) {
            if !StreamFormat::from_url(&stream.url).is_media() {
                let kind = proxy_kind(&stream.url);
                stream = stream.with_proxy(kind);
            }
            streams.push(stream);
        }

        Ok(streams)
    }
}
