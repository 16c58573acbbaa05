//! Compile options and defaults
//!
//! [`CompileOptions`] are per-invocation parameters and take precedence over
//! document metadata. [`CompileDefaults`] fill in whatever neither sets.

use quire_core::{ConfigError, KindRegistry, KindRole};
use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, MAX_LEVEL};

/// Content level used when neither options nor metadata set one
pub const DEFAULT_CONTENT_LEVEL: u8 = 2;

/// Per-invocation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Kind number for content events
    pub content_kind: Option<u16>,
    /// Header level at and below which sections become content events
    pub content_level: Option<u8>,
    pub auto_update: Option<bool>,
    pub reuse_identifier: Option<String>,
    /// Static root identifier
    pub identifier: Option<String>,
    /// Relay spec string (URL, URL list or category name)
    pub relays: Option<String>,
    /// Skip detection and force a dialect
    pub dialect: Option<Dialect>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_kind(mut self, kind: u16) -> Self {
        self.content_kind = Some(kind);
        self
    }

    pub fn with_content_level(mut self, level: u8) -> Self {
        self.content_level = Some(level);
        self
    }

    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = Some(auto_update);
        self
    }

    pub fn with_reuse_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.reuse_identifier = Some(identifier.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_relays(mut self, relays: impl Into<String>) -> Self {
        self.relays = Some(relays.into());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }
}

/// Configured fallbacks for compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileDefaults {
    pub content_level: u8,
    pub auto_update: bool,
    /// Kind numbers and their roles
    pub kinds: KindRegistry,
    /// Content kind for single-section documents; the LongForm kind when unset
    pub article_kind: Option<u16>,
    /// Content kind for sectioned documents; the PublicationContent kind when unset
    pub section_kind: Option<u16>,
}

impl Default for CompileDefaults {
    fn default() -> Self {
        Self {
            content_level: DEFAULT_CONTENT_LEVEL,
            auto_update: false,
            kinds: KindRegistry::default(),
            article_kind: None,
            section_kind: None,
        }
    }
}

impl CompileDefaults {
    pub fn with_content_level(mut self, level: u8) -> Self {
        self.content_level = level;
        self
    }

    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    pub fn with_kinds(mut self, kinds: KindRegistry) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_article_kind(mut self, kind: u16) -> Self {
        self.article_kind = Some(kind);
        self
    }

    pub fn with_section_kind(mut self, kind: u16) -> Self {
        self.section_kind = Some(kind);
        self
    }

    /// Default content kind for a document shape
    pub fn content_kind(&self, simple: bool) -> Option<u16> {
        if simple {
            self.article_kind
                .or_else(|| self.kinds.kind_for(KindRole::LongForm))
        } else {
            self.section_kind
                .or_else(|| self.kinds.kind_for(KindRole::PublicationContent))
        }
    }

    /// Kind number used for index events
    pub fn index_kind(&self) -> Option<u16> {
        self.kinds.kind_for(KindRole::PublicationIndex)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_LEVEL).contains(&self.content_level) {
            return Err(ConfigError::InvalidContentLevel(self.content_level));
        }
        for kind in [self.article_kind, self.section_kind].into_iter().flatten() {
            if !self.kinds.contains(kind) {
                return Err(ConfigError::UnregisteredKind(kind));
            }
        }
        if self.index_kind().is_none() {
            return Err(ConfigError::UnregisteredKind(KindRole::PublicationIndex.default_kind()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quire_core::{KIND_LONG_FORM, KIND_PUBLICATION_CONTENT, KIND_PUBLICATION_INDEX, KIND_WIKI};

    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = CompileDefaults::default();
        assert_eq!(defaults.content_level, 2);
        assert!(!defaults.auto_update);
        assert_eq!(defaults.content_kind(true), Some(KIND_LONG_FORM));
        assert_eq!(defaults.content_kind(false), Some(KIND_PUBLICATION_CONTENT));
        assert_eq!(defaults.index_kind(), Some(KIND_PUBLICATION_INDEX));
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_configured_kinds() {
        let defaults = CompileDefaults::default().with_section_kind(KIND_WIKI);
        assert_eq!(defaults.content_kind(false), Some(KIND_WIKI));
        assert!(defaults.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let defaults = CompileDefaults::default().with_content_level(0);
        assert_eq!(defaults.validate(), Err(ConfigError::InvalidContentLevel(0)));

        let defaults = CompileDefaults::default().with_content_level(7);
        assert_eq!(defaults.validate(), Err(ConfigError::InvalidContentLevel(7)));

        let defaults = CompileDefaults::default().with_article_kind(1);
        assert_eq!(defaults.validate(), Err(ConfigError::UnregisteredKind(1)));

        let defaults = CompileDefaults::default()
            .with_kinds(KindRegistry::empty().with(KIND_LONG_FORM, KindRole::LongForm));
        assert!(defaults.validate().is_err());
    }

    #[test]
    fn test_options_builder() {
        let options = CompileOptions::new()
            .with_content_level(3)
            .with_reuse_identifier("book")
            .with_dialect(Dialect::Markdown);
        assert_eq!(options.content_level, Some(3));
        assert_eq!(options.reuse_identifier.as_deref(), Some("book"));
        assert_eq!(options.dialect, Some(Dialect::Markdown));
        assert_eq!(options.relays, None);
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: CompileOptions =
            serde_json::from_str(r#"{"content_level": 1, "dialect": "asciidoc"}"#).unwrap();
        assert_eq!(options.content_level, Some(1));
        assert_eq!(options.dialect, Some(Dialect::AsciiDoc));
        assert_eq!(options.auto_update, None);
    }
}
