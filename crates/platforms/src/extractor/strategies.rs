//! Candidate extraction from page markup.
//!
//! Strategies run in priority order and the first one that yields anything
//! wins:
//!
//! 1. an embedded `[{file, label}, ...]` array, parsed leniently, with a
//!    line-level regex fallback when it is not valid even after cleanup
//! 2. an inline player `file: "...mp4"` setting
//! 3. bare absolute media URLs, minus thumbnails and posters

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use tracing::debug;

/// Filename substrings that mark images rather than media.
pub const URL_DENYLIST: [&str; 2] = ["thumbnail", "poster"];

static SOURCES_ARRAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)\[\s*\{[^\[\]]*?\bfile\b[^\[\]]*?\}\s*,?\s*\]"#).unwrap());

static FILE_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?file["']?\s*:\s*["']([^"']+)["']"#).unwrap());

static LABEL_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?label["']?\s*:\s*["']?([^"',}]+)"#).unwrap());

static INLINE_FILE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfile\s*:\s*["']([^"']*\.(?:mp4|m3u8|mkv|webm)[^"']*)["']"#).unwrap()
});

static BARE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?:(?:\\?/){2}[^\s"'<>()]+?\.(?:mp4|m3u8|mkv|webm)(?:\?[^\s"'<>()]*)?"#)
        .unwrap()
});

/// A candidate before quality normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub url: String,
    pub label: Option<String>,
}

impl RawCandidate {
    pub fn new(url: impl Into<String>, label: Option<String>) -> Self {
        Self {
            url: unescape(&url.into()),
            label,
        }
    }
}

/// Candidates in insertion order, rejecting exact URL duplicates.
#[derive(Debug, Default)]
pub struct CandidateSet {
    seen: FxHashSet<String>,
    items: Vec<RawCandidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the URL was already collected.
    pub fn push(&mut self, candidate: RawCandidate) -> bool {
        if !self.seen.insert(candidate.url.clone()) {
            debug!(url = %candidate.url, "Skipping duplicate candidate");
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = RawCandidate>) {
        for candidate in candidates {
            self.push(candidate);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<RawCandidate> {
        self.items
    }
}

/// Undo JSON and HTML escaping commonly found around embedded URLs.
pub fn unescape(value: &str) -> String {
    value
        .replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u003d", "=")
        .replace("\\u003D", "=")
        .replace("&amp;", "&")
        .replace("\\\"", "\"")
}

#[derive(Deserialize)]
struct SourceEntry {
    file: String,
    #[serde(default)]
    label: Option<serde_json::Value>,
}

fn label_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Rewrite a JavaScript object/array literal into JSON: single quotes become
/// double quotes, bare keys are quoted and trailing commas are dropped.
pub fn normalize_lenient_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            if quote == '\'' && chars[i + 1] == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(chars[i + 1]);
                            }
                            i += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                    i += 1;
                }
                out.push('"');
                i += 1;
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                    i += 1;
                    continue;
                }
                out.push(c);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ':' {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn parse_sources_array(block: &str) -> Option<Vec<RawCandidate>> {
    let normalized = normalize_lenient_json(block);
    let entries: Vec<SourceEntry> = serde_json::from_str(&normalized).ok()?;
    Some(
        entries
            .into_iter()
            .map(|entry| RawCandidate::new(entry.file, entry.label.and_then(label_text)))
            .collect(),
    )
}

fn scan_file_lines(block: &str) -> Vec<RawCandidate> {
    block
        .lines()
        .flat_map(|line| line.split('}'))
        .filter_map(|segment| {
            let file = FILE_LINE_REGEX.captures(segment)?.get(1)?.as_str();
            let label = LABEL_LINE_REGEX
                .captures(segment)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string());
            Some(RawCandidate::new(file, label))
        })
        .collect()
}

/// Strategy 1: `[{file, label}]` arrays inside script blocks.
pub fn extract_embedded_sources(html: &str) -> Vec<RawCandidate> {
    let mut set = CandidateSet::new();
    for block in SOURCES_ARRAY_REGEX.find_iter(html) {
        match parse_sources_array(block.as_str()) {
            Some(candidates) => set.extend(candidates),
            None => {
                debug!("Embedded sources are not valid JSON, scanning lines");
                set.extend(scan_file_lines(block.as_str()));
            }
        }
    }
    set.into_vec()
}

/// Strategy 2: inline player configuration.
pub fn extract_inline_file(html: &str) -> Vec<RawCandidate> {
    let mut set = CandidateSet::new();
    for caps in INLINE_FILE_REGEX.captures_iter(html) {
        if let Some(url) = caps.get(1) {
            set.push(RawCandidate::new(url.as_str(), None));
        }
    }
    set.into_vec()
}

pub fn is_denylisted(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
    URL_DENYLIST.iter().any(|word| file_name.contains(word))
}

/// Strategy 3: bare absolute media URLs.
pub fn extract_bare_urls(html: &str) -> Vec<RawCandidate> {
    let mut set = CandidateSet::new();
    for m in BARE_URL_REGEX.find_iter(html) {
        let candidate = RawCandidate::new(m.as_str(), None);
        if is_denylisted(&candidate.url) {
            debug!(url = %candidate.url, "Skipping denylisted URL");
            continue;
        }
        set.push(candidate);
    }
    set.into_vec()
}

/// Run the strategies in priority order, returning the first non-empty result.
pub fn extract_candidates(html: &str) -> Vec<RawCandidate> {
    let strategies: [(&str, fn(&str) -> Vec<RawCandidate>); 3] = [
        ("embedded sources", extract_embedded_sources),
        ("inline file", extract_inline_file),
        ("bare urls", extract_bare_urls),
    ];

    for (name, strategy) in strategies {
        let candidates = strategy(html);
        if !candidates.is_empty() {
            debug!(strategy = name, count = candidates.len(), "Strategy matched");
            return candidates;
        }
    }

    debug!("No strategy matched");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_json_normalization() {
        let input = "[{file:'https://cdn.example/a.mp4', label: '720p',}, {'file': \"https://cdn.example/b.mp4\",},]";
        let normalized = normalize_lenient_json(input);
        let parsed: serde_json::Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(parsed[0]["file"], "https://cdn.example/a.mp4");
        assert_eq!(parsed[0]["label"], "720p");
        assert_eq!(parsed[1]["file"], "https://cdn.example/b.mp4");
    }

    #[test]
    fn test_embedded_sources_single_quotes() {
        let html = r#"<script>
            jwplayer("p").setup({ sources: [
                {file: 'https:\/\/cdn.example\/ep\/1080.mp4', label: '1080p'},
                {file: 'https:\/\/cdn.example\/ep\/720.mp4', label: 720},
            ], image: "https://cdn.example/poster.jpg" });
        </script>"#;
        let candidates = extract_embedded_sources(html);
        assert_eq!(
            candidates,
            vec![
                RawCandidate::new("https://cdn.example/ep/1080.mp4", Some("1080p".into())),
                RawCandidate::new("https://cdn.example/ep/720.mp4", Some("720".into())),
            ]
        );
    }

    #[test]
    fn test_embedded_sources_falls_back_to_line_scan() {
        // Unquoted label value is not recoverable as JSON
        let html = r#"var s = [
            {"file": "https://cdn.example/a.m3u8", "label": HD 720p},
            {"file": "https://cdn.example/b.m3u8", "label": SD}
        ];"#;
        let candidates = extract_embedded_sources(html);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].url, "https://cdn.example/a.m3u8");
        assert_eq!(candidates[0].label.as_deref(), Some("HD 720p"));
        assert_eq!(candidates[1].label.as_deref(), Some("SD"));
    }

    #[test]
    fn test_inline_file() {
        let html = r#"player.setup({ file: "https://cdn.example/v/ep3.mp4?e=1&amp;t=2" });"#;
        let candidates = extract_inline_file(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.example/v/ep3.mp4?e=1&t=2");
    }

    #[test]
    fn test_bare_urls_skip_denylist_and_duplicates() {
        let html = r#"
            <img src="https://cdn.example/thumbnail_ep3.mp4">
            <video src="https://cdn.example/ep3-480p.mp4"></video>
            <a href="https://cdn.example/ep3-480p.mp4">download</a>
            <meta content="https://cdn.example/Poster.webm">
        "#;
        let candidates = extract_bare_urls(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.example/ep3-480p.mp4");
    }

    #[test]
    fn test_priority_order_stops_at_first_match() {
        let html = r#"
            sources: [{"file": "https://cdn.example/a.mp4", "label": "1080p"}]
            file: "https://cdn.example/b.mp4"
            https://cdn.example/c.mp4
        "#;
        let candidates = extract_candidates(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.example/a.mp4");

        let html = r#"file: "https://cdn.example/b.mp4" and https://cdn.example/c.mp4"#;
        let candidates = extract_candidates(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://cdn.example/b.mp4");
    }

    #[test]
    fn test_candidate_set_merges_overlapping_strategies() {
        let html = r#"file: "https://cdn.example/b.mp4" https://cdn.example/b.mp4 https://cdn.example/c.mp4"#;
        let mut set = CandidateSet::new();
        set.extend(extract_inline_file(html));
        set.extend(extract_bare_urls(html));
        let urls: Vec<String> = set.into_vec().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, ["https://cdn.example/b.mp4", "https://cdn.example/c.mp4"]);
    }

    #[test]
    fn test_no_candidates() {
        assert!(extract_candidates("<html><body>Coming soon</body></html>").is_empty());
    }
}
