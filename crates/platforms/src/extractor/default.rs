use super::error::ExtractorError;
use super::factory::ExtractorFactory;
use super::provider::ProviderConfig;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, redirect};
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub(crate) const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub(crate) const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Header set that passes for a desktop browser.
pub fn browser_headers(user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let ua = user_agent
        .and_then(|ua| HeaderValue::from_str(ua).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_UA));
    headers.insert(USER_AGENT, ua);
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );
    headers
}

/// The two clients every factory hands out: one follows redirects, the other
/// reports them so interstitials can be detected.
#[derive(Debug, Clone)]
pub struct HttpClients {
    pub client: Client,
    pub no_redirect: Client,
}

impl HttpClients {
    pub fn new(
        proxy_config: Option<ProxyConfig>,
        timeout: Duration,
    ) -> Result<Self, ExtractorError> {
        Ok(Self {
            client: build_client(proxy_config.clone(), timeout, redirect::Policy::default())?,
            no_redirect: build_client(proxy_config, timeout, redirect::Policy::none())?,
        })
    }
}

pub fn default_client() -> Result<Client, ExtractorError> {
    create_client(None)
}

pub fn create_client(proxy_config: Option<ProxyConfig>) -> Result<Client, ExtractorError> {
    build_client(proxy_config, DEFAULT_TIMEOUT, redirect::Policy::default())
}

fn platform_tls_config() -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(ring::default_provider());
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_platform_verifier()?
        .with_no_client_auth())
}

fn build_client(
    proxy_config: Option<ProxyConfig>,
    timeout: Duration,
    redirect_policy: redirect::Policy,
) -> Result<Client, ExtractorError> {
    let mut builder = Client::builder().redirect(redirect_policy).timeout(timeout);

    // Without platform roots, reqwest's bundled webpki roots are used
    match platform_tls_config() {
        Ok(tls_config) => builder = builder.use_preconfigured_tls(tls_config),
        Err(e) => warn!(error = %e, "Platform certificate verifier unavailable"),
    }

    if let Some(config) = proxy_config {
        match reqwest::Proxy::all(&config.url) {
            Ok(mut proxy) => {
                if let (Some(username), Some(password)) = (config.username, config.password) {
                    proxy = proxy.basic_auth(&username, &password);
                }
                builder = builder.proxy(proxy);
            }
            Err(e) => {
                warn!(proxy = %config.url, error = %e, "Failed to configure proxy");
            }
        }
    }

    builder
        .build()
        .map_err(|e| ExtractorError::ClientError(e.to_string()))
}

/// Returns a new `ExtractorFactory` for the given providers.
pub fn default_factory(providers: Vec<ProviderConfig>) -> Result<ExtractorFactory, ExtractorError> {
    factory_with_proxy(providers, None, DEFAULT_TIMEOUT)
}

/// Returns a new `ExtractorFactory` with proxy support.
pub fn factory_with_proxy(
    providers: Vec<ProviderConfig>,
    proxy_config: Option<ProxyConfig>,
    timeout: Duration,
) -> Result<ExtractorFactory, ExtractorError> {
    let clients = HttpClients::new(proxy_config, timeout)?;
    Ok(ExtractorFactory::new(clients, providers))
}
