use crate::extractor::default::browser_headers;
use crate::media::{EpisodeId, ProviderResult, StreamCandidate};

use super::error::{ErrorKind, ExtractorError};
use super::provider::ProviderConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rustc_hash::FxHashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Base extractor shared by every provider variant.
///
/// Holds the provider configuration, the HTTP client, a browser-like header
/// set and a cookie store. Cookies are added to every request built through
/// [`Extractor::request`].
#[derive(Debug, Clone)]
pub struct Extractor {
    pub provider: Arc<ProviderConfig>,
    // The reqwest client
    pub client: Client,
    platform_headers: HeaderMap,
    pub cookies: FxHashMap<String, String>,
}

/// Body of a successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

impl Extractor {
    pub fn new(provider: Arc<ProviderConfig>, client: Client) -> Self {
        let mut extractor = Self {
            provider,
            client,
            platform_headers: browser_headers(None),
            cookies: FxHashMap::default(),
        };
        if let Some(cookies) = extractor.provider.cookies.clone() {
            extractor.set_cookies_from_string(&cookies);
        }
        extractor
    }

    pub fn code(&self) -> &str {
        &self.provider.code
    }

    pub fn platform_name(&self) -> &str {
        &self.provider.name
    }

    pub fn add_header<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match (
            HeaderName::from_str(key.as_ref()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.platform_headers.insert(name, value);
            }
            _ => warn!(header = key.as_ref(), "Ignoring invalid header"),
        }
    }

    pub fn add_cookie<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Set cookies from a cookie string (format: "name1=value1; name2=value2").
    pub fn set_cookies_from_string(&mut self, cookie_string: &str) {
        for cookie in cookie_string.split(';') {
            let cookie = cookie.trim();
            if let Some((name, value)) = cookie.split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    fn build_cookie_header(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }

        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();

        HeaderValue::from_str(&pairs.join("; ")).ok()
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(&self.client, Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(&self.client, Method::POST, url)
    }

    /// Build a request on `client` with platform headers and cookies.
    pub fn request(&self, client: &Client, method: Method, url: &str) -> RequestBuilder {
        let mut builder = client
            .request(method, url)
            .headers(self.platform_headers.clone());
        if let Some(cookies) = self.build_cookie_header() {
            builder = builder.header(reqwest::header::COOKIE, cookies);
        }
        builder
    }

    /// Fetch a page, mapping 404 to [`ExtractorError::NotFound`] and any
    /// other non-2xx status to [`ExtractorError::UpstreamStatus`].
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, ExtractorError> {
        let response = self.get(url).send().await?;
        Self::read_page(url, response).await
    }

    pub(crate) async fn read_page(
        url: &str,
        response: reqwest::Response,
    ) -> Result<FetchedPage, ExtractorError> {
        let status = response.status();
        debug!(url, status = status.as_u16(), "Fetched page");

        if status == StatusCode::NOT_FOUND {
            return Err(ExtractorError::NotFound);
        }
        if !status.is_success() {
            return Err(ExtractorError::UpstreamStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
        })
    }

    pub fn get_platform_headers(&self) -> &HeaderMap {
        &self.platform_headers
    }
}

#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    fn get_extractor(&self) -> &Extractor;

    fn code(&self) -> &str {
        self.get_extractor().code()
    }

    fn get_platform_headers(&self) -> &HeaderMap {
        &self.get_extractor().platform_headers
    }

    async fn extract(&self, episode: &EpisodeId) -> Result<Vec<StreamCandidate>, ExtractorError>;

    /// Never fails: errors are folded into the returned [`ProviderResult`].
    async fn resolve(&self, episode: &EpisodeId) -> ProviderResult {
        let code = self.code().to_string();
        match self.extract(episode).await {
            Ok(streams) => {
                debug!(provider = %code, count = streams.len(), "Provider resolved");
                ProviderResult::found(code, streams)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(provider = %code, episode = %episode, "Episode not found");
                ProviderResult::empty(code)
            }
            Err(e) => {
                warn!(provider = %code, episode = %episode, error = %e, "Provider failed");
                ProviderResult::failed(code, e.to_string())
            }
        }
    }
}
