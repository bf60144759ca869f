//! Quality labels and ranking.
//!
//! Providers describe quality in many ways (`"1080p60"`, a bare height, a
//! file name). Everything is folded into a fixed ladder of labels, each with
//! an integer priority used for ordering.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::stream_info::StreamCandidate;

/// Priority for a 3-4 digit height that matches no bucket exactly.
pub const UNMATCHED_HEIGHT_PRIORITY: u32 = 50;

static HEIGHT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{3,4})(?:\D|$)").unwrap());

// `720p`, `1080p60`, but not `720px`
static RESOLUTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{3,4})p(?:\d{2,3})?(?:[^a-z0-9]|$)").unwrap()
});

static UHD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:4k|uhd)\b").unwrap());

/// Ordered from best to worst; the derived `Ord` follows declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityLabel {
    #[serde(rename = "2160p", alias = "4k")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "unknown")]
    Unknown,
}

impl QualityLabel {
    pub const LADDER: [QualityLabel; 7] = [
        QualityLabel::P2160,
        QualityLabel::P1440,
        QualityLabel::P1080,
        QualityLabel::P720,
        QualityLabel::P480,
        QualityLabel::P360,
        QualityLabel::P240,
    ];

    pub const fn priority(&self) -> u32 {
        match self {
            QualityLabel::P2160 => 100,
            QualityLabel::P1440 => 90,
            QualityLabel::P1080 => 80,
            QualityLabel::P720 => 60,
            QualityLabel::P480 => 40,
            QualityLabel::P360 => 30,
            QualityLabel::P240 => 20,
            QualityLabel::Unknown => 0,
        }
    }

    pub const fn height(&self) -> Option<u32> {
        match self {
            QualityLabel::P2160 => Some(2160),
            QualityLabel::P1440 => Some(1440),
            QualityLabel::P1080 => Some(1080),
            QualityLabel::P720 => Some(720),
            QualityLabel::P480 => Some(480),
            QualityLabel::P360 => Some(360),
            QualityLabel::P240 => Some(240),
            QualityLabel::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::P2160 => "2160p",
            QualityLabel::P1440 => "1440p",
            QualityLabel::P1080 => "1080p",
            QualityLabel::P720 => "720p",
            QualityLabel::P480 => "480p",
            QualityLabel::P360 => "360p",
            QualityLabel::P240 => "240p",
            QualityLabel::Unknown => "unknown",
        }
    }

    /// Exact bucket for a height.
    pub fn from_height(height: u32) -> Option<Self> {
        Self::LADDER
            .into_iter()
            .find(|label| label.height() == Some(height))
    }

    /// Closest bucket for a height, ties going to the higher label.
    pub fn nearest(height: u32) -> Self {
        Self::LADDER
            .into_iter()
            .min_by_key(|label| label.height().map_or(u32::MAX, |h| h.abs_diff(height)))
            .unwrap_or(QualityLabel::Unknown)
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "4k" | "uhd" => return Ok(QualityLabel::P2160),
            "unknown" => return Ok(QualityLabel::Unknown),
            _ => {}
        }

        value
            .strip_suffix('p')
            .unwrap_or(&value)
            .parse::<u32>()
            .ok()
            .and_then(Self::from_height)
            .ok_or_else(|| format!("unknown quality label: {s}"))
    }
}

/// Normalized quality of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality {
    pub label: QualityLabel,
    pub priority: u32,
}

impl Quality {
    pub const UNKNOWN: Quality = Quality {
        label: QualityLabel::Unknown,
        priority: 0,
    };

    fn exact(label: QualityLabel) -> Self {
        Self {
            label,
            priority: label.priority(),
        }
    }

    fn from_height(height: u32) -> Self {
        match QualityLabel::from_height(height) {
            Some(label) => Self::exact(label),
            None => Self {
                label: QualityLabel::nearest(height),
                priority: UNMATCHED_HEIGHT_PRIORITY,
            },
        }
    }
}

/// Raw text fields a provider exposes about a candidate's quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityHints<'a> {
    pub quality: Option<&'a str>,
    pub label: Option<&'a str>,
    pub height: Option<u32>,
    pub name: Option<&'a str>,
}

impl<'a> QualityHints<'a> {
    pub fn label(label: &'a str) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }

    pub fn height(height: u32) -> Self {
        Self {
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn name(name: &'a str) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }
}

fn explicit_resolution(text: &str) -> Option<Quality> {
    if UHD_REGEX.is_match(text) {
        return Some(Quality::exact(QualityLabel::P2160));
    }
    RESOLUTION_REGEX
        .captures(text)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(Quality::from_height)
}

fn bare_heights(text: &str) -> impl Iterator<Item = u32> + '_ {
    HEIGHT_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
}

/// Short quality fields: a resolution token, else the first bare number.
fn quality_from_text(text: &str) -> Option<Quality> {
    explicit_resolution(text).or_else(|| bare_heights(text).next().map(Quality::from_height))
}

/// Last path segment of a URL or file name, without query or fragment.
fn name_segment(name: &str) -> &str {
    let end = name.find(['?', '#']).unwrap_or(name.len());
    name[..end]
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// File names only count a resolution token or a bare number that is an
/// exact ladder height; dates, ports and ids elsewhere in a URL are ignored.
fn quality_from_name(name: &str) -> Option<Quality> {
    let segment = name_segment(name);
    explicit_resolution(segment).or_else(|| {
        bare_heights(segment)
            .find_map(QualityLabel::from_height)
            .map(Quality::exact)
    })
}

/// Infer a quality from the hints, trying the explicit quality tag, the
/// label, the numeric height and the free-text name, in that order.
pub fn extract_quality(hints: &QualityHints<'_>) -> Quality {
    if let Some(quality) = hints.quality.and_then(quality_from_text) {
        return quality;
    }
    if let Some(quality) = hints.label.and_then(quality_from_text) {
        return quality;
    }
    if let Some(height) = hints.height.filter(|h| (100..10_000).contains(h)) {
        return Quality::from_height(height);
    }
    hints
        .name
        .and_then(quality_from_name)
        .unwrap_or(Quality::UNKNOWN)
}

/// Stable sort, highest priority first.
pub fn sort_by_quality(mut streams: Vec<StreamCandidate>) -> Vec<StreamCandidate> {
    streams.sort_by(|a, b| b.priority.cmp(&a.priority));
    streams
}

pub fn filter_by_min_quality(
    streams: Vec<StreamCandidate>,
    min: QualityLabel,
) -> Vec<StreamCandidate> {
    let threshold = min.priority();
    streams
        .into_iter()
        .filter(|stream| stream.priority >= threshold)
        .collect()
}

/// Group candidates by label, best label first, preserving order within a group.
pub fn group_by_quality(
    streams: Vec<StreamCandidate>,
) -> BTreeMap<QualityLabel, Vec<StreamCandidate>> {
    let mut groups: BTreeMap<QualityLabel, Vec<StreamCandidate>> = BTreeMap::new();
    for stream in streams {
        groups.entry(stream.quality).or_default().push(stream);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, label: &str) -> StreamCandidate {
        StreamCandidate::new("test", url, &QualityHints::label(label))
    }

    #[test]
    fn test_label_with_frame_rate() {
        let quality = extract_quality(&QualityHints::label("1080p60"));
        assert_eq!(quality.label, QualityLabel::P1080);
        assert_eq!(quality.priority, 80);
    }

    #[test]
    fn test_numeric_height() {
        let quality = extract_quality(&QualityHints::height(720));
        assert_eq!(quality.label, QualityLabel::P720);
        assert_eq!(quality.priority, 60);
    }

    #[test]
    fn test_name_without_number_is_unknown() {
        assert_eq!(
            extract_quality(&QualityHints::name("source.mkv")),
            Quality::UNKNOWN
        );
        assert_eq!(extract_quality(&QualityHints::label("SD")), Quality::UNKNOWN);
        assert_eq!(extract_quality(&QualityHints::default()), Quality::UNKNOWN);
    }

    #[test]
    fn test_unmatched_height_ranks_between_480_and_720() {
        let quality = extract_quality(&QualityHints::label("576p"));
        assert_eq!(quality.priority, UNMATCHED_HEIGHT_PRIORITY);
        assert_eq!(quality.label, QualityLabel::P480);
        assert!(quality.priority > QualityLabel::P480.priority());
        assert!(quality.priority < QualityLabel::P720.priority());
    }

    #[test]
    fn test_field_order() {
        let hints = QualityHints {
            quality: Some("HD"),
            label: Some("720p"),
            height: Some(1080),
            name: Some("ep-480.mp4"),
        };
        assert_eq!(extract_quality(&hints).label, QualityLabel::P720);

        let hints = QualityHints {
            quality: None,
            label: Some("Server 2"),
            height: None,
            name: Some("https://cdn.example.com/ep-480p.mp4"),
        };
        assert_eq!(extract_quality(&hints).label, QualityLabel::P480);
    }

    #[test]
    fn test_name_ignores_numbers_outside_file_name() {
        let dated = extract_quality(&QualityHints::name(
            "https://cdn.example/uploads/2024/05/frieren-1080p.mp4",
        ));
        assert_eq!(dated.label, QualityLabel::P1080);
        assert_eq!(dated.priority, 80);

        let host_port = extract_quality(&QualityHints::name("http://127.0.0.1:8080/v/ep3.mp4"));
        assert_eq!(host_port, Quality::UNKNOWN);

        let query = extract_quality(&QualityHints::name(
            "https://cdn.example/v/ep3.m3u8?expires=1717171717&res=2160",
        ));
        assert_eq!(query, Quality::UNKNOWN);
    }

    #[test]
    fn test_name_prefers_resolution_token() {
        let quality = extract_quality(&QualityHints::name(
            "https://cdn.example/v/2024-frieren-720p.mp4",
        ));
        assert_eq!(quality.label, QualityLabel::P720);

        // A bare number in the file name counts only when it is a known height
        assert_eq!(
            extract_quality(&QualityHints::name("https://cdn.example/v/ep_480.mp4")).label,
            QualityLabel::P480
        );
        assert_eq!(
            extract_quality(&QualityHints::name("https://cdn.example/v/frieren-2024.mp4")),
            Quality::UNKNOWN
        );
    }

    #[test]
    fn test_4k_alias() {
        assert_eq!(
            extract_quality(&QualityHints::label("4K UHD")).label,
            QualityLabel::P2160
        );
        assert_eq!("4k".parse::<QualityLabel>(), Ok(QualityLabel::P2160));
        assert_eq!("720".parse::<QualityLabel>(), Ok(QualityLabel::P720));
        assert!("potato".parse::<QualityLabel>().is_err());
    }

    #[test]
    fn test_priorities_strictly_decrease() {
        let priorities: Vec<u32> = QualityLabel::LADDER.iter().map(|l| l.priority()).collect();
        assert!(priorities.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(QualityLabel::Unknown.priority(), 0);
    }

    #[test]
    fn test_sort_is_stable_and_descending() {
        let streams = vec![
            candidate("https://a/1.mp4", "480p"),
            candidate("https://a/2.mp4", "1080p"),
            candidate("https://a/3.mp4", "480"),
            candidate("https://a/4.mp4", "?"),
            candidate("https://a/5.mp4", "1080"),
        ];
        let sorted = sort_by_quality(streams);
        let urls: Vec<&str> = sorted.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://a/2.mp4",
                "https://a/5.mp4",
                "https://a/1.mp4",
                "https://a/3.mp4",
                "https://a/4.mp4"
            ]
        );
        assert!(sorted.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn test_filter_min_quality_is_idempotent() {
        let streams = vec![
            candidate("https://a/1.mp4", "1080p"),
            candidate("https://a/2.mp4", "720p"),
            candidate("https://a/3.mp4", "576p"),
            candidate("https://a/4.mp4", "360p"),
        ];
        let once = filter_by_min_quality(streams, QualityLabel::P480);
        assert_eq!(once.len(), 3);
        assert!(once.iter().all(|s| s.priority >= 40));

        let twice = filter_by_min_quality(once.clone(), QualityLabel::P480);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_group_by_quality() {
        let streams = vec![
            candidate("https://a/1.mp4", "720p"),
            candidate("https://a/2.mp4", "1080p"),
            candidate("https://a/3.mp4", "720"),
        ];
        let groups = group_by_quality(streams);
        let labels: Vec<QualityLabel> = groups.keys().copied().collect();
        assert_eq!(labels, [QualityLabel::P1080, QualityLabel::P720]);
        assert_eq!(groups[&QualityLabel::P720].len(), 2);
        assert_eq!(groups[&QualityLabel::P720][0].url, "https://a/1.mp4");
    }
}
