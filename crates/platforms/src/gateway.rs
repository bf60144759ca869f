//! Batch fetch gateway.
//!
//! Fetches a bounded list of upstream URLs concurrently with browser-like
//! headers and reports one structured result per URL, in input order.

use std::str::FromStr;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::extractor::browser_headers;

/// Upper bound on URLs per batch; extra entries are ignored.
pub const MAX_BATCH_URLS: usize = 20;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no valid http(s) urls given")]
    NoUrls,
    #[error("unsupported method: {0}")]
    InvalidMethod(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Per-URL outcome. `status` is 0 when no response was received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub url: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

impl FetchResult {
    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            content_type: None,
            body: None,
            error: Some(error.to_string()),
            success: false,
        }
    }
}

/// Single-URL mode response, passed through untouched.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Percent-decode one entry, keeping it verbatim when it is not valid UTF-8.
pub fn decode_url(value: &str) -> String {
    let trimmed = value.trim();
    urlencoding::decode(trimmed)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| trimmed.to_string())
}

/// Split a comma-separated list, decode each entry, drop non-http(s)
/// entries and keep at most [`MAX_BATCH_URLS`].
pub fn parse_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(decode_url)
        .filter(|url| !url.is_empty())
        .filter(|url| has_http_scheme(url))
        .take(MAX_BATCH_URLS)
        .collect()
}

pub fn parse_method(method: Option<&str>) -> Result<Method, GatewayError> {
    match method.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(Method::GET),
        Some(m) => Method::from_str(&m.to_ascii_uppercase())
            .map_err(|_| GatewayError::InvalidMethod(m.to_string())),
    }
}

pub struct BatchGateway {
    client: Client,
    headers: HeaderMap,
}

impl BatchGateway {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            headers: browser_headers(None),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.headers = browser_headers(Some(user_agent));
        self
    }

    async fn send(
        &self,
        url: &str,
        method: &Method,
        body: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .headers(self.headers.clone());
        if let Some(body) = body {
            request = request.body(body.to_string());
        }
        request.send().await
    }

    pub async fn fetch_one(&self, url: &str, method: &Method, body: Option<&str>) -> FetchResult {
        let response = match self.send(url, method, body).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "Gateway fetch failed");
                return FetchResult::failed(url, e);
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.text().await {
            Ok(text) => FetchResult {
                url: url.to_string(),
                status,
                content_type,
                body: Some(text),
                error: None,
                success: is_success(status),
            },
            Err(e) => FetchResult::failed(url, e),
        }
    }

    /// Fetch every URL concurrently; results keep the input order.
    pub async fn fetch_all(
        &self,
        urls: &[String],
        method: &Method,
        body: Option<&str>,
    ) -> Vec<FetchResult> {
        let urls = &urls[..urls.len().min(MAX_BATCH_URLS)];
        let results = join_all(urls.iter().map(|url| self.fetch_one(url, method, body))).await;
        info!(
            count = results.len(),
            success = results.iter().filter(|r| r.success).count(),
            "Batch fetch finished"
        );
        results
    }

    /// Single-URL mode: the upstream body is returned as-is.
    pub async fn fetch_raw(
        &self,
        url: &str,
        method: &Method,
        body: Option<&str>,
    ) -> Result<RawResponse, GatewayError> {
        let url = decode_url(url);
        if !has_http_scheme(&url) {
            return Err(GatewayError::NoUrls);
        }

        let response = self.send(&url, method, body).await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::platforms::test_support::clients;
    use wiremock::matchers::{body_string, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_urls_drops_non_http() {
        let urls = parse_urls("https://a.example,https://b.example,not-a-url");
        assert_eq!(urls, ["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_parse_urls_decodes_and_caps() {
        let raw: Vec<String> = (0..25).map(|i| format!("https://h.example/{i}")).collect();
        assert_eq!(parse_urls(&raw.join(",")).len(), MAX_BATCH_URLS);

        let urls = parse_urls("https%3A%2F%2Fa.example%2Fx%3Fq%3D1, ftp://x, HTTP://B.example");
        assert_eq!(urls, ["https://a.example/x?q=1", "HTTP://B.example"]);
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method(None).unwrap(), Method::GET);
        assert_eq!(parse_method(Some("post")).unwrap(), Method::POST);
        assert!(parse_method(Some("bad method")).is_err());
    }

    #[test]
    fn test_success_range() {
        assert!(is_success(200));
        assert!(is_success(302));
        assert!(!is_success(404));
        assert!(!is_success(0));
    }

    #[tokio::test]
    async fn test_batch_makes_exactly_two_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&server)
            .await;

        let raw = format!("{0}/a,{0}/b,not-a-url", server.uri());
        let urls = parse_urls(&raw);
        let gateway = BatchGateway::new(clients().client);
        let results = gateway.fetch_all(&urls, &Method::GET, None).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results[0].url.ends_with("/a"));
        assert!(results[1].url.ends_with("/b"));
    }

    #[tokio::test]
    async fn test_batch_caps_at_twenty_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(20)
            .mount(&server)
            .await;

        let raw: Vec<String> = (0..25).map(|i| format!("{}/u/{i}", server.uri())).collect();
        let urls = parse_urls(&raw.join(","));
        let gateway = BatchGateway::new(clients().client);
        let results = gateway.fetch_all(&urls, &Method::GET, None).await;
        assert_eq!(results.len(), 20);
    }

    #[tokio::test]
    async fn test_per_url_failures_keep_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .and(body_string("q=1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let urls = vec![
            "http://127.0.0.1:9/down".to_string(),
            format!("{}/ok", server.uri()),
            format!("{}/missing", server.uri()),
        ];
        let gateway = BatchGateway::new(clients().client);
        let results = gateway.fetch_all(&urls, &Method::POST, Some("q=1")).await;

        assert_eq!(results[0].status, 0);
        assert!(!results[0].success);
        assert!(results[0].error.is_some());

        assert_eq!(results[1].status, 200);
        assert_eq!(results[1].content_type.as_deref(), Some("application/json"));
        assert!(results[1].success);

        assert_eq!(results[2].status, 404);
        assert!(!results[2].success);
    }

    #[tokio::test]
    async fn test_fetch_raw_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>raw</html>"))
            .mount(&server)
            .await;

        let gateway = BatchGateway::new(clients().client);
        let response = gateway
            .fetch_raw(&format!("{}/page", server.uri()), &Method::GET, None)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"<html>raw</html>"));

        assert!(matches!(
            gateway.fetch_raw("javascript:alert(1)", &Method::GET, None).await,
            Err(GatewayError::NoUrls)
        ));
    }
}
