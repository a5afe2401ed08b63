use std::sync::Arc;

use crate::crypto::{CryptoProvider, RustCryptoProvider};
use crate::operation::FieldLengths;

/// Settings shared by every roster in a registry.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub(crate) provider: Arc<dyn CryptoProvider>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            provider: Arc::new(RustCryptoProvider::default()),
        }
    }
}

impl RosterConfig {
    /// Create a roster config builder
    pub fn builder() -> RosterConfigBuilder {
        RosterConfigBuilder::new()
    }

    pub fn provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    /// Entry field sizes for this provider's hash.
    pub fn field_lengths(&self) -> FieldLengths {
        FieldLengths::new(self.provider.hash().size())
    }
}

#[derive(Default, Debug)]
pub struct RosterConfigBuilder {
    config: RosterConfig,
}

impl RosterConfigBuilder {
    /// Create a roster config
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with crypto provider
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.config.provider = provider;
        self
    }

    /// Finalize and build the roster config
    pub fn build(self) -> RosterConfig {
        self.config
    }
}
