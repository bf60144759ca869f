use std::sync::Arc;

use super::default::HttpClients;
use super::error::ExtractorError;
use super::platform_extractor::PlatformExtractor;
use super::provider::{ProviderConfig, ProviderKind};
use crate::extractor::platforms::{
    ajax::AjaxExtractor, encoded::EncodedExtractor, gated::GatedExtractor, page::PageExtractor,
};
use crate::media::ProviderResult;
use tracing::{debug, warn};

// A type alias for a thread-safe constructor function.
type ExtractorConstructor = fn(Arc<ProviderConfig>, &HttpClients) -> Arc<dyn PlatformExtractor>;

struct KindEntry {
    kind: ProviderKind,
    constructor: ExtractorConstructor,
}

// Macro to create a constructor function for a given provider kind
macro_rules! create_constructor {
    ($name:ident, $builder:expr) => {
        fn $name(
            provider: Arc<ProviderConfig>,
            clients: &HttpClients,
        ) -> Arc<dyn PlatformExtractor> {
            Arc::new($builder(provider, clients))
        }
    };
}

create_constructor!(new_page, PageExtractor::new);
create_constructor!(new_ajax, AjaxExtractor::new);
create_constructor!(new_encoded, EncodedExtractor::new);
create_constructor!(new_gated, GatedExtractor::new);

// Static kind registry
static KINDS: &[KindEntry] = &[
    KindEntry {
        kind: ProviderKind::Page,
        constructor: new_page,
    },
    KindEntry {
        kind: ProviderKind::Ajax,
        constructor: new_ajax,
    },
    KindEntry {
        kind: ProviderKind::Encoded,
        constructor: new_encoded,
    },
    KindEntry {
        kind: ProviderKind::Gated,
        constructor: new_gated,
    },
];

/// Which providers a resolution should query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelection {
    All,
    Only(Vec<String>),
}

impl ProviderSelection {
    pub const ALL_CODE: &'static str = "all";

    /// `all` selects every provider, anything else a comma-separated list.
    pub fn parse(value: &str) -> Self {
        let codes: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        if codes.is_empty() || codes.iter().any(|code| code == Self::ALL_CODE) {
            ProviderSelection::All
        } else {
            Self::only(codes)
        }
    }

    /// Explicit code list, sorted and deduplicated so equal sets share a
    /// cache key.
    pub fn only(codes: impl IntoIterator<Item = String>) -> Self {
        let mut codes: Vec<String> = codes.into_iter().collect();
        codes.sort_unstable();
        codes.dedup();
        ProviderSelection::Only(codes)
    }

    /// Provider segment of the cache key.
    pub fn cache_code(&self) -> String {
        match self {
            ProviderSelection::All => Self::ALL_CODE.to_string(),
            ProviderSelection::Only(codes) => codes.join("+"),
        }
    }
}

/// Extractors built for a selection. Configured providers that failed to
/// build are reported as failed results instead of aborting the selection.
pub struct Selected {
    pub extractors: Vec<Arc<dyn PlatformExtractor>>,
    pub rejected: Vec<ProviderResult>,
}

/// A factory for creating provider-specific extractors.
pub struct ExtractorFactory {
    clients: HttpClients,
    providers: Vec<Arc<ProviderConfig>>,
}

impl ExtractorFactory {
    pub fn new(clients: HttpClients, providers: Vec<ProviderConfig>) -> Self {
        Self {
            clients,
            providers: providers
                .into_iter()
                .filter(|p| p.enabled)
                .map(Arc::new)
                .collect(),
        }
    }

    pub fn providers(&self) -> &[Arc<ProviderConfig>] {
        &self.providers
    }

    pub fn clients(&self) -> &HttpClients {
        &self.clients
    }

    fn construct(
        &self,
        provider: &Arc<ProviderConfig>,
    ) -> Result<Arc<dyn PlatformExtractor>, ExtractorError> {
        provider.validate()?;
        let entry = KINDS
            .iter()
            .find(|entry| entry.kind == provider.kind)
            .ok_or(ExtractorError::UnsupportedExtractor)?;
        debug!(code = %provider.code, kind = %provider.kind, "Creating extractor");
        Ok((entry.constructor)(provider.clone(), &self.clients))
    }

    fn find(&self, code: &str) -> Result<&Arc<ProviderConfig>, ExtractorError> {
        self.providers
            .iter()
            .find(|p| p.code == code)
            .ok_or_else(|| ExtractorError::UnknownProvider(code.to_string()))
    }

    pub fn create_extractor(
        &self,
        code: &str,
    ) -> Result<Arc<dyn PlatformExtractor>, ExtractorError> {
        self.construct(self.find(code)?)
    }

    /// Extractors for a selection, in configuration order for `All` and in
    /// code order otherwise. Only an unknown code fails the whole selection.
    pub fn create_selection(
        &self,
        selection: &ProviderSelection,
    ) -> Result<Selected, ExtractorError> {
        let providers = match selection {
            ProviderSelection::All => self.providers.iter().collect::<Vec<_>>(),
            ProviderSelection::Only(codes) => codes
                .iter()
                .map(|code| self.find(code))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut selected = Selected {
            extractors: Vec::with_capacity(providers.len()),
            rejected: Vec::new(),
        };
        for provider in providers {
            match self.construct(provider) {
                Ok(extractor) => selected.extractors.push(extractor),
                Err(e) => {
                    warn!(code = %provider.code, error = %e, "Provider skipped");
                    let failed = ProviderResult::failed(provider.code.as_str(), e.to_string());
                    selected.rejected.push(failed);
                }
            }
        }
        Ok(selected)
    }
}
