//! Configuration for the publish coordinator

use std::path::Path;
use std::time::Duration;

use quire_compiler::CompileDefaults;
use quire_core::ConfigError;
use quire_relay::{DisseminationConfig, RelayCategories, RelaySpec, SelectorConfig};
use serde::{Deserialize, Serialize};

/// Acknowledgements required per event when none is configured
pub const DEFAULT_QUORUM: usize = 1;

/// Configuration for a [`Publisher`](crate::Publisher)
///
/// Loadable from TOML; every section is optional:
///
/// ```toml
/// quorum = 2
/// run_timeout = "5m"
/// default_relays = "default"
///
/// [compile]
/// content_level = 3
///
/// [categories]
/// default = ["wss://relay.one", "wss://relay.two"]
///
/// [dissemination]
/// max_attempts = 5
/// attempt_timeout = "10s"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub compile: CompileDefaults,
    #[serde(flatten)]
    pub relay_categories: RelayCategories,
    /// Used when neither the options nor the document name relays
    pub default_relays: RelaySpec,
    pub selector: SelectorConfig,
    pub dissemination: DisseminationConfig,
    /// Relays that must acknowledge an event for it to count as durable
    pub quorum: usize,
    /// Deadline for dispatching the whole plan
    #[serde(with = "quire_core::duration_serde")]
    pub run_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            compile: CompileDefaults::default(),
            relay_categories: RelayCategories::default(),
            default_relays: RelaySpec::default(),
            selector: SelectorConfig::default(),
            dissemination: DisseminationConfig::default(),
            quorum: DEFAULT_QUORUM,
            run_timeout: Duration::from_secs(300),
        }
    }
}

impl PublisherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn with_compile(mut self, compile: CompileDefaults) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_relay_categories(mut self, categories: RelayCategories) -> Self {
        self.relay_categories = categories;
        self
    }

    pub fn with_default_relays(mut self, spec: RelaySpec) -> Self {
        self.default_relays = spec;
        self
    }

    pub fn with_selector(mut self, selector: SelectorConfig) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_dissemination(mut self, dissemination: DisseminationConfig) -> Self {
        self.dissemination = dissemination;
        self
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum == 0 {
            return Err(ConfigError::InvalidQuorum(self.quorum));
        }
        self.dissemination.validate()?;
        self.compile.validate()?;
        for kind in &self.selector.probe_kinds {
            if !self.compile.kinds.contains(*kind) {
                return Err(ConfigError::UnregisteredKind(*kind));
            }
        }
        Ok(())
    }
}
