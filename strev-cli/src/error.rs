use platforms_parser::enrichment::EnrichmentError;
use platforms_parser::extractor::ExtractorError;
use platforms_parser::gateway::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Fetch error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Metadata lookup error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Semaphore acquire error: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No streams found for {0}")]
    NoStreamsAvailable(String),

    #[error("Timeout error: Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn no_streams_found(episode: impl Into<String>) -> Self {
        Self::NoStreamsAvailable(episode.into())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
