//! Title metadata lookups against a Jikan-style API.

mod client;
mod config;
mod error;
pub mod models;
mod rate_limit;

pub use client::{
    EnrichmentClient, normalize_title, rank_candidates, search_limit, title_similarity,
};
pub use config::EnrichmentConfig;
pub use error::EnrichmentError;
pub use models::{TitleCandidate, TitleDetails};
pub use rate_limit::{RateLimiter, RetryPolicy};
