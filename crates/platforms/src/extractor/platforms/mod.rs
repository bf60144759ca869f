pub mod ajax;
pub mod encoded;
pub mod gated;
pub mod page;

use crate::media::{QualityHints, StreamCandidate};

use super::strategies::RawCandidate;

/// Normalize raw candidates from one page. RAW status and referer apply to
/// every candidate alike.
pub(crate) fn build_candidates(
    provider: &str,
    raws: Vec<RawCandidate>,
    is_raw: bool,
    referer: &str,
) -> Vec<StreamCandidate> {
    raws.into_iter()
        .map(|raw| {
            let hints = QualityHints {
                label: raw.label.as_deref(),
                name: Some(&raw.url),
                ..QualityHints::default()
            };
            StreamCandidate::new(provider, raw.url.as_str(), &hints)
                .with_raw(is_raw)
                .with_referer(referer)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::extractor::default::HttpClients;
    use crate::extractor::provider::{ProviderConfig, ProviderKind};

    pub fn clients() -> HttpClients {
        HttpClients::new(None, Duration::from_secs(5)).unwrap()
    }

    pub fn provider(code: &str, kind: ProviderKind, base_url: &str) -> Arc<ProviderConfig> {
        Arc::new(ProviderConfig::new(code, code.to_uppercase(), kind, base_url))
    }

    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::QualityLabel;

    #[test]
    fn test_build_candidates_reads_quality_from_file_name() {
        let raws = vec![
            RawCandidate::new("https://cdn.example/uploads/2024/05/frieren-1080p.mp4", None),
            RawCandidate::new("http://127.0.0.1:8080/v/ep3.mp4", None),
            RawCandidate::new("https://cdn.example/2160/ep3.mp4", Some("720p".to_string())),
        ];
        let built = build_candidates("ap", raws, false, "https://ap.example/x-episode-3/");

        let qualities: Vec<(QualityLabel, u32)> =
            built.iter().map(|c| (c.quality, c.priority)).collect();
        assert_eq!(
            qualities,
            [
                (QualityLabel::P1080, 80),
                (QualityLabel::Unknown, 0),
                (QualityLabel::P720, 60)
            ]
        );
        let referer = Some("https://ap.example/x-episode-3/");
        assert!(built.iter().all(|c| c.referer.as_deref() == referer));
    }
}
