use std::cmp::Ordering;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::EnrichmentConfig;
use super::error::EnrichmentError;
use super::models::{DetailsResponse, SearchResponse, TitleCandidate, TitleDetails};
use super::rate_limit::{RateLimiter, RetryPolicy};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 25;

/// Client for a Jikan-style metadata API.
///
/// One instance owns the limiter state, so every caller sharing the instance
/// shares the request budget.
pub struct EnrichmentClient {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
    cache: Cache<String, String>,
}

impl EnrichmentClient {
    pub fn new(client: Client, config: &EnrichmentConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(Duration::from_millis(config.min_interval_ms)),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_backoff: Duration::from_millis(config.backoff_ms),
                ..RetryPolicy::default()
            },
            cache,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search titles, best match first.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TitleCandidate>, EnrichmentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EnrichmentError::InvalidQuery(
                "search query is empty".to_string(),
            ));
        }
        let limit = search_limit(limit);

        let url = format!(
            "{}/anime?q={}&limit={limit}",
            self.base_url,
            urlencoding::encode(query)
        );
        let response: SearchResponse = self.get_json(&url).await?;

        let mut candidates: Vec<TitleCandidate> = response
            .data
            .into_iter()
            .map(|data| {
                let similarity = data
                    .all_titles()
                    .map(|title| title_similarity(query, title))
                    .fold(0.0, f64::max);
                TitleCandidate {
                    id: data.mal_id,
                    image: data.image_url(),
                    title: data.title,
                    title_english: data.title_english,
                    kind: data.kind,
                    episodes: data.episodes,
                    year: data.year,
                    score: data.score,
                    url: data.url,
                    similarity,
                }
            })
            .collect();

        rank_candidates(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }

    pub async fn details(&self, id: u64) -> Result<TitleDetails, EnrichmentError> {
        if id == 0 {
            return Err(EnrichmentError::InvalidQuery("title id must be positive".to_string()));
        }
        let url = format!("{}/anime/{id}", self.base_url);
        let response: DetailsResponse = self.get_json(&url).await?;
        Ok(response.data.into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        if let Some(body) = self.cache.get(url).await {
            debug!(url, "Enrichment cache hit");
            return Ok(serde_json::from_str(&body)?);
        }

        let body = self.get_with_retry(url).await?;
        let parsed = serde_json::from_str(&body)?;
        self.cache.insert(url.to_string(), body).await;
        Ok(parsed)
    }

    async fn get_with_retry(&self, url: &str) -> Result<String, EnrichmentError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.acquire().await;
            debug!(url, attempt, "Enrichment request");

            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.retry.max_attempts {
                    warn!(url, attempts = attempt, "Enrichment retry budget exhausted");
                    return Err(EnrichmentError::RateLimited { attempts: attempt });
                }
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                let delay = self.retry.backoff(attempt, retry_after);
                debug!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(EnrichmentError::NotFound);
            }
            if !status.is_success() {
                return Err(EnrichmentError::Upstream(status.as_u16()));
            }

            return Ok(response.text().await?);
        }
    }
}

/// Lowercase alphanumerics with single spaces between words.
/// Result count a search actually requests, default 10, at most 25.
pub fn search_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
}

pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn bigrams(value: &str) -> FxHashMap<(char, char), usize> {
    let chars: Vec<char> = value.chars().collect();
    let mut counts = FxHashMap::default();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Dice coefficient over character bigrams of the normalized titles, in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_title(a);
    let b = normalize_title(b);
    if a == b {
        return if a.is_empty() { 0.0 } else { 1.0 };
    }
    if a.chars().count() < 2 || b.chars().count() < 2 {
        return 0.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    let overlap: usize = left
        .iter()
        .map(|(pair, count)| (*count).min(right.get(pair).copied().unwrap_or(0)))
        .sum();
    let total: usize = left.values().sum::<usize>() + right.values().sum::<usize>();

    2.0 * overlap as f64 / total as f64
}

/// Similarity descending, then upstream score descending. Stable otherwise.
pub fn rank_candidates(candidates: &mut [TitleCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.score.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
    });
}
