use crate::media::StreamFormat;
use crate::media::quality::{QualityHints, QualityLabel, extract_quality};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    High,
    /// Synthesized without verifying that the URL resolves
    Low,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamCandidate {
    // Provider code, e.g. "ap"
    pub provider: String,
    pub url: String,
    pub quality: QualityLabel,
    pub priority: u32,
    pub format: StreamFormat,
    // Unsubtitled release
    pub is_raw: bool,
    // Not a media URL, needs another resolution hop
    pub needs_proxy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_kind: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    // Page the URL was found on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl StreamCandidate {
    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        hints: &QualityHints<'_>,
    ) -> Self {
        let url = url.into();
        let quality = extract_quality(hints);
        Self {
            provider: provider.into(),
            format: StreamFormat::from_url(&url),
            url,
            quality: quality.label,
            priority: quality.priority,
            is_raw: false,
            needs_proxy: false,
            proxy_kind: None,
            confidence: Confidence::High,
            note: None,
            referer: None,
        }
    }

    pub fn with_raw(mut self, is_raw: bool) -> Self {
        self.is_raw = is_raw;
        self
    }

    pub fn with_proxy(mut self, kind: impl Into<String>) -> Self {
        self.needs_proxy = true;
        self.proxy_kind = Some(kind.into());
        self
    }

    pub fn with_low_confidence(mut self, note: impl Into<String>) -> Self {
        self.confidence = Confidence::Low;
        self.note = Some(note.into());
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

impl fmt::Display for StreamCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.provider, self.quality, self.format)?;
        if self.is_raw {
            write!(f, " RAW")?;
        }
        if let Some(kind) = &self.proxy_kind {
            write!(f, " via {kind}")?;
        }
        if self.confidence == Confidence::Low {
            write!(f, " (low confidence)")?;
        }
        Ok(())
    }
}
