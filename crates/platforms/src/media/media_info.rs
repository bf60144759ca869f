use serde::{Deserialize, Serialize};

use super::episode::EpisodeId;
use super::quality::{QualityLabel, filter_by_min_quality};
use super::stream_info::StreamCandidate;

/// Outcome of one provider for one episode. Always produced, even on failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub provider: String,
    pub streams: Vec<StreamCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResult {
    pub fn found(provider: impl Into<String>, streams: Vec<StreamCandidate>) -> Self {
        Self {
            provider: provider.into(),
            streams,
            error: None,
        }
    }

    /// Nothing to offer, and nothing went wrong (e.g. a 404 page).
    pub fn empty(provider: impl Into<String>) -> Self {
        Self::found(provider, Vec::new())
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            streams: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Found,
    /// Every provider was tried and none produced a candidate
    NoStreams,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

/// Merged, ranked result of resolving one episode.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeStreams {
    pub episode: EpisodeId,
    pub status: ResolutionStatus,
    pub streams: Vec<StreamCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ProviderFailure>,
}

impl EpisodeStreams {
    pub const NO_STREAMS_MESSAGE: &'static str = "No streams found";

    pub fn new(
        episode: EpisodeId,
        streams: Vec<StreamCandidate>,
        failures: Vec<ProviderFailure>,
    ) -> Self {
        let mut result = Self {
            episode,
            status: ResolutionStatus::Found,
            streams,
            message: None,
            failures,
        };
        result.refresh_status();
        result
    }

    pub fn has_streams(&self) -> bool {
        !self.streams.is_empty()
    }

    /// Drop candidates below `min`, keeping the placeholder semantics.
    pub fn with_min_quality(mut self, min: QualityLabel) -> Self {
        self.streams = filter_by_min_quality(std::mem::take(&mut self.streams), min);
        self.refresh_status();
        self
    }

    fn refresh_status(&mut self) {
        if self.streams.is_empty() {
            self.status = ResolutionStatus::NoStreams;
            self.message = Some(Self::NO_STREAMS_MESSAGE.to_string());
        } else {
            self.status = ResolutionStatus::Found;
            self.message = None;
        }
    }
}
