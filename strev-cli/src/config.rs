use anyhow::{Context, Result};
use platforms_parser::enrichment::EnrichmentConfig;
use platforms_parser::extractor::{ProviderConfig, ProxyConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strev_cache::CacheConfig;

use crate::cli::OutputFormat;

const APP_NAME: &str = "strev";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default output format
    pub default_output_format: OutputFormat,

    /// Default request timeout in seconds
    pub default_timeout: u64,

    /// Maximum episodes resolved concurrently by `resolve`
    pub max_concurrent: usize,

    /// User agent string for gateway fetches
    pub user_agent: Option<String>,

    /// Enable colored output
    pub colored_output: bool,

    /// Default proxy URL (supports http, https, socks5)
    pub default_proxy: Option<String>,

    /// Default proxy username (if proxy requires authentication)
    pub default_proxy_username: Option<String>,

    /// Default proxy password (if proxy requires authentication)
    pub default_proxy_password: Option<String>,

    /// Edge service settings
    pub server: ServerConfig,

    /// Stream cache settings
    pub cache: CacheConfig,

    /// Title metadata API settings
    pub enrichment: EnrichmentConfig,

    /// Providers queried during resolution, in priority order
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address of `strev serve`
    pub bind: String,
    /// Seconds between expired-entry sweeps
    pub maintenance_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7878".to_string(),
            maintenance_interval_secs: 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_format: OutputFormat::Pretty,
            default_timeout: 30,
            max_concurrent: 5,
            user_agent: None,
            colored_output: true,
            default_proxy: None,
            default_proxy_username: None,
            default_proxy_password: None,
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            enrichment: EnrichmentConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => {
                if path.exists() {
                    let content = std::fs::read_to_string(path)
                        .context("Failed to read configuration file")?;
                    Self::from_toml(&content)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Use confy for default location
                let config: Self =
                    confy::load(APP_NAME, None).context("Failed to load configuration")?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject provider declarations that can never resolve anything and
    /// cache sizes the memory tiers cannot be built with.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate().context("Invalid cache settings")?;
        for provider in &self.providers {
            provider
                .validate()
                .with_context(|| format!("Invalid provider '{}'", provider.code))?;
        }
        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, None).ok()
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, toml_string).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Reset configuration to defaults and save
    pub fn reset(config_path: Option<&Path>) -> Result<()> {
        let path = config_path
            .map(|p| p.to_path_buf())
            .or_else(Self::default_config_path)
            .context("No configuration path available")?;

        let default_config = Self::default();
        default_config.save(&path)?;

        Ok(())
    }

    /// Show current configuration as a formatted string
    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration for display")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }

    pub fn proxy(&self) -> Option<ProxyConfig> {
        self.default_proxy.as_ref().map(|url| ProxyConfig {
            url: url.clone(),
            username: self.default_proxy_username.clone(),
            password: self.default_proxy_password.clone(),
        })
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn with_overrides(
        mut self,
        timeout: Option<u64>,
        proxy_url: Option<String>,
        proxy_username: Option<String>,
        proxy_password: Option<String>,
    ) -> Self {
        if let Some(timeout) = timeout {
            self.default_timeout = timeout;
        }
        if proxy_url.is_some() {
            self.default_proxy = proxy_url;
            self.default_proxy_username = proxy_username;
            self.default_proxy_password = proxy_password;
        } else {
            self.default_proxy_username = proxy_username.or(self.default_proxy_username);
            self.default_proxy_password = proxy_password.or(self.default_proxy_password);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platforms_parser::extractor::ProviderKind;
    use strev_cache::StoreKind;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            default_timeout = 10

            [cache]
            store = "none"

            [[providers]]
            code = "ap"
            name = "Alpha"
            kind = "page"
            base_url = "https://alpha.example"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_timeout, 10);
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.cache.store, StoreKind::None);
        assert_eq!(config.server.bind, "127.0.0.1:7878");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::Page);
        assert!(config.providers[0].enabled);
    }

    #[test]
    fn test_invalid_provider_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [[providers]]
            code = "all"
            name = "Reserved"
            kind = "page"
            base_url = "https://alpha.example"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_covers_cache_and_providers() {
        let zero_edge = AppConfig::from_toml(
            r#"
            [cache]
            max_edge_size = 0
            "#,
        );
        assert!(zero_edge.is_err());

        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.providers.push(ProviderConfig::new(
            "en",
            "Encoded",
            ProviderKind::Encoded,
            "https://encoded.example",
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("strev.toml");

        let mut config = AppConfig::default();
        config.providers.push(ProviderConfig::new(
            "ap",
            "Alpha",
            ProviderKind::Ajax,
            "https://alpha.example",
        ));
        config.save(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.providers[0].code, "ap");
        assert_eq!(loaded.default_output_format, OutputFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default().with_overrides(
            Some(5),
            Some("socks5://127.0.0.1:1080".into()),
            Some("user".into()),
            None,
        );
        assert_eq!(config.timeout(), Duration::from_secs(5));
        let proxy = config.proxy().unwrap();
        assert_eq!(proxy.url, "socks5://127.0.0.1:1080");
        assert_eq!(proxy.username.as_deref(), Some("user"));
    }
}
