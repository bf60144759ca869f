//! RAW (unsubtitled) detection from a series listing page.

use regex::{Regex, escape};
use tracing::debug;

use crate::media::EpisodeId;

use super::platform_extractor::Extractor;

/// Bytes after an episode link searched for the marker class.
pub const RAW_LOOKAHEAD: usize = 400;

fn floor_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Whether the listing entry linking to `episode` carries `marker` as a class
/// within [`RAW_LOOKAHEAD`] bytes after the link, stopping at the next link.
pub fn listing_marks_raw(listing_html: &str, episode: &EpisodeId, marker: &str) -> bool {
    let link = format!(
        r#"href\s*=\s*["'][^"']*/{}/?["']"#,
        escape(&episode.to_string())
    );
    let class = format!(
        r#"class\s*=\s*["'][^"']*\b{}\b[^"']*["']"#,
        escape(marker)
    );
    let (Ok(link_regex), Ok(class_regex)) = (Regex::new(&link), Regex::new(&class)) else {
        return false;
    };

    link_regex.find_iter(listing_html).any(|found| {
        let start = found.end();
        let end = floor_boundary(listing_html, start + RAW_LOOKAHEAD);
        let mut window = &listing_html[start..end];
        if let Some(next_link) = window.find("href") {
            window = &window[..next_link];
        }
        class_regex.is_match(window)
    })
}

/// Fetch the series listing and test the episode's entry. Any failure,
/// including a provider without listing support, reads as not RAW.
pub async fn detect_raw(extractor: &Extractor, episode: &EpisodeId) -> bool {
    let provider = &extractor.provider;
    let Some(series_url) = provider.series_url(episode) else {
        return false;
    };
    let Some(marker) = provider.raw_marker.as_deref() else {
        return false;
    };

    match extractor.fetch_page(&series_url).await {
        Ok(page) => {
            let is_raw = listing_marks_raw(&page.body, episode, marker);
            debug!(provider = %provider.code, episode = %episode, is_raw, "RAW status");
            is_raw
        }
        Err(e) => {
            debug!(
                provider = %provider.code,
                url = %series_url,
                error = %e,
                "Series listing unavailable, assuming not RAW"
            );
            false
        }
    }
}
