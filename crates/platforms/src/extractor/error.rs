use thiserror::Error;

/// Failure classes visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, TLS or DNS failure reaching an upstream
    UpstreamUnavailable,
    /// Non-2xx, non-404 status
    UpstreamRejected,
    NotFound,
    /// Page fetched but nothing usable in it
    ExtractionFailure,
    RateLimited,
    MalformedInput,
}

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    UpstreamStatus(u16),
    #[error("not found")]
    NotFound,
    #[error("unsupported extractor")]
    UnsupportedExtractor,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("no streams found")]
    NoStreamsFound,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("client error: {0}")]
    ClientError(String),
    #[error("other error: {0}")]
    Other(String),
}

impl ExtractorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractorError::HttpError(e) => match e.status().map(|s| s.as_u16()) {
                Some(404) => ErrorKind::NotFound,
                Some(429) => ErrorKind::RateLimited,
                Some(_) => ErrorKind::UpstreamRejected,
                None if e.is_decode() => ErrorKind::ExtractionFailure,
                None => ErrorKind::UpstreamUnavailable,
            },
            ExtractorError::UpstreamStatus(404) | ExtractorError::NotFound => ErrorKind::NotFound,
            ExtractorError::UpstreamStatus(429) => ErrorKind::RateLimited,
            ExtractorError::UpstreamStatus(_) => ErrorKind::UpstreamRejected,
            ExtractorError::InvalidUrl(_)
            | ExtractorError::UnsupportedExtractor
            | ExtractorError::UnknownProvider(_)
            | ExtractorError::ValidationError(_) => ErrorKind::MalformedInput,
            ExtractorError::ClientError(_) => ErrorKind::UpstreamUnavailable,
            ExtractorError::JsonError(_)
            | ExtractorError::NoStreamsFound
            | ExtractorError::Other(_) => ErrorKind::ExtractionFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ExtractorError::UpstreamStatus(404).kind(), ErrorKind::NotFound);
        assert_eq!(
            ExtractorError::UpstreamStatus(503).kind(),
            ErrorKind::UpstreamRejected
        );
        assert_eq!(
            ExtractorError::UpstreamStatus(429).kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(ExtractorError::UpstreamStatus(503).to_string(), "HTTP 503");
        assert_eq!(
            ExtractorError::ValidationError("x".into()).kind(),
            ErrorKind::MalformedInput
        );
    }
}
