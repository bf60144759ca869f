use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container/transport of a candidate, inferred from the URL path.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    Hls,
    Mp4,
    Mkv,
    Webm,
    #[default]
    Unknown,
}

impl StreamFormat {
    pub fn as_str(&self) -> &str {
        match self {
            StreamFormat::Hls => "hls",
            StreamFormat::Mp4 => "mp4",
            StreamFormat::Mkv => "mkv",
            StreamFormat::Webm => "webm",
            StreamFormat::Unknown => "unknown",
        }
    }

    pub fn from_extension(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "m3u8" => StreamFormat::Hls,
            "mp4" | "m4v" => StreamFormat::Mp4,
            "mkv" => StreamFormat::Mkv,
            "webm" => StreamFormat::Webm,
            _ => StreamFormat::Unknown,
        }
    }

    /// Infer the format from the last path segment, ignoring query and fragment.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => StreamFormat::Unknown,
        }
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, StreamFormat::Unknown)
    }
}

impl Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hls" | "m3u8" => Ok(StreamFormat::Hls),
            "mp4" => Ok(StreamFormat::Mp4),
            "mkv" => Ok(StreamFormat::Mkv),
            "webm" => Ok(StreamFormat::Webm),
            "unknown" => Ok(StreamFormat::Unknown),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_ignores_query() {
        assert_eq!(
            StreamFormat::from_url("https://cdn.example.com/v/ep1.m3u8?token=a.b"),
            StreamFormat::Hls
        );
        assert_eq!(
            StreamFormat::from_url("https://cdn.example.com/v/ep1.MP4"),
            StreamFormat::Mp4
        );
        assert_eq!(
            StreamFormat::from_url("https://player.example.com/e/abc"),
            StreamFormat::Unknown
        );
    }
}
