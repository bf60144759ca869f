mod default;
pub mod error;
pub mod factory;
pub mod platform_extractor;
pub mod platforms;
pub mod provider;
pub mod raw_status;
pub mod strategies;

pub use default::{
    DEFAULT_TIMEOUT, HttpClients, ProxyConfig, browser_headers, create_client, default_client,
    default_factory, factory_with_proxy,
};
pub use error::{ErrorKind, ExtractorError};
pub use factory::{ExtractorFactory, ProviderSelection, Selected};
pub use platform_extractor::{Extractor, PlatformExtractor};
pub use provider::{ProviderConfig, ProviderKind};
