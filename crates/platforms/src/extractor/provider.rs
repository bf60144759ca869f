use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::media::EpisodeId;

use super::error::ExtractorError;

/// Extraction variant a provider uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Candidates embedded in the episode page
    Page,
    /// Page candidates plus admin-ajax player lookups
    Ajax,
    /// Base64-encoded media paths in page links
    Encoded,
    /// Episode page may redirect to an interstitial
    Gated,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Page => "page",
            ProviderKind::Ajax => "ajax",
            ProviderKind::Encoded => "encoded",
            ProviderKind::Gated => "gated",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "page" => Ok(ProviderKind::Page),
            "ajax" => Ok(ProviderKind::Ajax),
            "encoded" => Ok(ProviderKind::Encoded),
            "gated" => Ok(ProviderKind::Gated),
            _ => Err(ExtractorError::UnsupportedExtractor),
        }
    }
}

fn default_episode_path() -> String {
    "/{series}-episode-{episode}/".to_string()
}

fn default_ajax_endpoint() -> String {
    "/wp-admin/admin-ajax.php".to_string()
}

fn default_ajax_action() -> String {
    "doo_player_ajax".to_string()
}

fn default_enabled() -> bool {
    true
}

/// One content provider, as declared in configuration.
///
/// Path templates accept `{series}`, `{episode}` (number as written in the
/// episode id), `{number}` (plain number) and `{episode_padded}` (number
/// zero-padded to two digits).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Short code used in cache keys and routes, e.g. `ap`
    pub code: String,
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default = "default_episode_path")]
    pub episode_path: String,
    /// Series listing page, enables RAW detection together with `raw_marker`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_marker: Option<String>,
    #[serde(default = "default_ajax_endpoint")]
    pub ajax_endpoint: String,
    #[serde(default = "default_ajax_action")]
    pub ajax_action: String,
    /// Query parameter carrying a base64 media path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_param: Option<String>,
    /// Base joined with decoded relative media paths; defaults to `base_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_base: Option<String>,
    /// Media URL synthesized when the episode page redirects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: ProviderKind,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
            base_url: base_url.into(),
            episode_path: default_episode_path(),
            series_path: None,
            raw_marker: None,
            ajax_endpoint: default_ajax_endpoint(),
            ajax_action: default_ajax_action(),
            encoded_param: None,
            media_base: None,
            media_template: None,
            cookies: None,
            enabled: true,
        }
    }

    pub fn fill_template(template: &str, episode: &EpisodeId) -> String {
        template
            .replace("{series}", episode.series())
            .replace("{episode_padded}", &format!("{:02}", episode.number()))
            .replace("{number}", &episode.number().to_string())
            .replace("{episode}", episode.token())
    }

    /// Join a path or absolute URL onto `base`.
    pub fn join(base: &str, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if let Some(rest) = path.strip_prefix("//") {
            let scheme = base.split("://").next().unwrap_or("https");
            return format!("{scheme}://{rest}");
        }
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn absolute(&self, path: &str) -> String {
        Self::join(&self.base_url, path)
    }

    /// Canonical episode page URL.
    pub fn episode_url(&self, episode: &EpisodeId) -> String {
        self.absolute(&Self::fill_template(&self.episode_path, episode))
    }

    pub fn series_url(&self, episode: &EpisodeId) -> Option<String> {
        self.series_path
            .as_deref()
            .map(|path| self.absolute(&Self::fill_template(path, episode)))
    }

    pub fn ajax_url(&self) -> String {
        self.absolute(&self.ajax_endpoint)
    }

    pub fn media_base(&self) -> &str {
        self.media_base.as_deref().unwrap_or(&self.base_url)
    }

    pub fn validate(&self) -> Result<(), ExtractorError> {
        let code_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if self.code.is_empty() || !self.code.chars().all(code_char) {
            return Err(ExtractorError::ValidationError(format!(
                "provider code '{}' must be non-empty alphanumeric",
                self.code
            )));
        }
        if self.code == "all" {
            return Err(ExtractorError::ValidationError(
                "provider code 'all' is reserved".to_string(),
            ));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ExtractorError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        if self.kind == ProviderKind::Encoded && self.encoded_param.is_none() {
            return Err(ExtractorError::ValidationError(format!(
                "provider '{}' of kind encoded needs encoded_param",
                self.code
            )));
        }
        Ok(())
    }
}
