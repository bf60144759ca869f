use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractor::error::ExtractorError;

pub static EPISODE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+)-episode-(\d+)$").unwrap());

/// Logical episode key, `<series-slug>-episode-<n>`.
///
/// The number token is kept as written, so `x-episode-03` renders back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpisodeId {
    series: String,
    number: u32,
    token: String,
}

impl EpisodeId {
    pub fn new(series: impl Into<String>, number: u32) -> Result<Self, ExtractorError> {
        let series = series.into();
        if number == 0 {
            return Err(ExtractorError::ValidationError(
                "episode number must be at least 1".to_string(),
            ));
        }
        Self::parse(&format!("{series}-episode-{number}"))
    }

    pub fn parse(value: &str) -> Result<Self, ExtractorError> {
        let caps = EPISODE_ID_REGEX.captures(value.trim()).ok_or_else(|| {
            ExtractorError::ValidationError(format!(
                "invalid episode id '{value}', expected <series>-episode-<n>"
            ))
        })?;

        let number = caps[2]
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ExtractorError::ValidationError(format!("invalid episode number in '{value}'"))
            })?;

        Ok(Self {
            series: caps[1].to_string(),
            number,
            token: caps[2].to_string(),
        })
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Episode number exactly as it appeared in the id.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-episode-{}", self.series, self.token)
    }
}

impl FromStr for EpisodeId {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EpisodeId {
    type Error = ExtractorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EpisodeId> for String {
    fn from(value: EpisodeId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_trailing_suffix() {
        let id = EpisodeId::parse("one-piece-episode-1071").unwrap();
        assert_eq!(id.series(), "one-piece");
        assert_eq!(id.number(), 1071);
        assert_eq!(id.to_string(), "one-piece-episode-1071");
    }

    #[test]
    fn test_series_may_contain_episode_word() {
        let id = EpisodeId::parse("the-last-episode-episode-2").unwrap();
        assert_eq!(id.series(), "the-last-episode");
        assert_eq!(id.number(), 2);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "one-piece",
            "one-piece-episode-",
            "one-piece-episode-0",
            "one piece-episode-1",
            "../etc-episode-1",
        ] {
            assert!(EpisodeId::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_keeps_zero_padding() {
        let id = EpisodeId::parse("x-episode-03").unwrap();
        assert_eq!(id.number(), 3);
        assert_eq!(id.token(), "03");
        assert_eq!(id.to_string(), "x-episode-03");

        let back: EpisodeId = serde_json::from_str("\"x-episode-03\"").unwrap();
        assert_eq!(back, id);
        assert_ne!(back, EpisodeId::parse("x-episode-3").unwrap());
    }

    #[test]
    fn test_serde_as_string() {
        let id = EpisodeId::parse("frieren-episode-3").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"frieren-episode-3\"");
        let back: EpisodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
