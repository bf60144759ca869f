use thiserror::Error;

use crate::extractor::ErrorKind;

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("title not found")]
    NotFound,
    #[error("HTTP {0}")]
    Upstream(u16),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl EnrichmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrichmentError::Http(_) => ErrorKind::UpstreamUnavailable,
            EnrichmentError::RateLimited { .. } => ErrorKind::RateLimited,
            EnrichmentError::NotFound => ErrorKind::NotFound,
            EnrichmentError::Upstream(status) if *status >= 500 => ErrorKind::UpstreamUnavailable,
            EnrichmentError::Upstream(_) => ErrorKind::UpstreamRejected,
            EnrichmentError::Json(_) => ErrorKind::ExtractionFailure,
            EnrichmentError::InvalidQuery(_) => ErrorKind::MalformedInput,
        }
    }
}
