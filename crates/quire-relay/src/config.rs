//! Relay configuration

use std::collections::BTreeMap;
use std::time::Duration;

use quire_core::{ConfigError, RelayUrl};
use serde::{Deserialize, Serialize};

/// Relay used when no configured relay answers
pub const DEFAULT_FALLBACK_RELAY: &str = "wss://thecitadel.nostr1.com";

/// Category name that selects every configured relay
pub const ALL_CATEGORIES: &str = "all";

/// Named groups of relays, e.g. `default`, `wiki`, `backup`
///
/// ```toml
/// [categories]
/// default = ["wss://relay.one", "wss://relay.two"]
/// wiki = ["wss://wiki.relay"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCategories {
    #[serde(default)]
    categories: BTreeMap<String, Vec<RelayUrl>>,
}

impl RelayCategories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_category<I, S>(mut self, name: impl Into<String>, urls: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|u| RelayUrl::parse(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.categories.insert(name.into(), urls);
        Ok(self)
    }

    /// URLs in one category, or every category for `all`
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn resolve(&self, name: &str) -> Result<Vec<RelayUrl>, ConfigError> {
        let urls: Vec<&RelayUrl> = if name == ALL_CATEGORIES && !self.categories.contains_key(name) {
            self.categories.values().flatten().collect()
        } else {
            self.categories
                .get(name)
                .ok_or_else(|| ConfigError::UnknownCategory(name.to_string()))?
                .iter()
                .collect()
        };
        let mut seen = Vec::with_capacity(urls.len());
        for url in urls {
            if !seen.contains(url) {
                seen.push(url.clone());
            }
        }
        Ok(seen)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        name == ALL_CATEGORIES || self.categories.contains_key(name)
    }

    /// Category a URL belongs to, if any
    pub fn category_of(&self, url: &RelayUrl) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, urls)| urls.contains(url))
            .map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Liveness probing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    #[serde(with = "quire_core::duration_serde")]
    pub probe_timeout: Duration,
    /// Tried only when nothing else answers; `None` disables the fallback
    pub fallback_relay: Option<RelayUrl>,
    /// Kinds the probe query asks for
    pub probe_kinds: Vec<u16>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            fallback_relay: RelayUrl::parse(DEFAULT_FALLBACK_RELAY).ok(),
            probe_kinds: vec![quire_core::KIND_PUBLICATION_INDEX, quire_core::KIND_PUBLICATION_CONTENT],
        }
    }
}

impl SelectorConfig {
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_fallback_relay(mut self, relay: Option<RelayUrl>) -> Self {
        self.fallback_relay = relay;
        self
    }

    pub fn with_probe_kinds(mut self, kinds: Vec<u16>) -> Self {
        self.probe_kinds = kinds;
        self
    }
}

/// Per-relay retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisseminationConfig {
    pub max_attempts: u32,
    /// Bound on one connect + publish round trip
    #[serde(with = "quire_core::duration_serde")]
    pub attempt_timeout: Duration,
    #[serde(with = "quire_core::duration_serde")]
    pub base_backoff: Duration,
    #[serde(with = "quire_core::duration_serde")]
    pub max_backoff: Duration,
    /// Bound on one query round trip
    #[serde(with = "quire_core::duration_serde")]
    pub query_timeout: Duration,
}

impl Default for DisseminationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            query_timeout: Duration::from_secs(10),
        }
    }
}

impl DisseminationConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORIES: &str = r#"
[categories]
default = ["wss://relay.one/", "wss://relay.two"]
wiki = ["wss://wiki.relay", "wss://relay.one"]
"#;

    #[test]
    fn test_categories_from_toml() {
        let cats = RelayCategories::from_toml_str(CATEGORIES).unwrap();
        let default = cats.resolve("default").unwrap();
        assert_eq!(default.len(), 2);
        assert_eq!(default[0].as_str(), "wss://relay.one");
        assert_eq!(cats.names().collect::<Vec<_>>(), vec!["default", "wiki"]);
    }

    #[test]
    fn test_all_flattens_and_dedups() {
        let cats = RelayCategories::from_toml_str(CATEGORIES).unwrap();
        let all: Vec<_> = cats
            .resolve("all")
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(all, vec!["wss://relay.one", "wss://relay.two", "wss://wiki.relay"]);
    }

    #[test]
    fn test_unknown_category() {
        let cats = RelayCategories::from_toml_str(CATEGORIES).unwrap();
        assert_eq!(
            cats.resolve("missing"),
            Err(ConfigError::UnknownCategory("missing".to_string()))
        );
        assert!(cats.contains("all"));
        assert!(!cats.contains("missing"));
    }

    #[test]
    fn test_invalid_url_in_toml() {
        let err = RelayCategories::from_toml_str("[categories]\nbad = [\"https://nope\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_builder_validates_urls() {
        let cats = RelayCategories::new().with_category("x", ["ws://local.test"]).unwrap();
        assert_eq!(
            cats.category_of(&RelayUrl::parse("ws://local.test").unwrap()),
            Some("x")
        );
        assert!(RelayCategories::new().with_category("x", ["ftp://no"]).is_err());
    }

    #[test]
    fn test_dissemination_defaults_and_toml() {
        let config = DisseminationConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.base_backoff, Duration::from_millis(250));
        assert_eq!(config.max_backoff, Duration::from_secs(4));

        let config: DisseminationConfig =
            toml::from_str("max_attempts = 5\nbase_backoff = \"100ms\"").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_backoff, Duration::from_millis(100));
        assert_eq!(config.max_backoff, Duration::from_secs(4));

        assert_eq!(
            config.with_max_attempts(0).validate(),
            Err(ConfigError::InvalidMaxAttempts)
        );
    }

    #[test]
    fn test_selector_defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(
            config.fallback_relay.as_ref().map(RelayUrl::as_str),
            Some(DEFAULT_FALLBACK_RELAY)
        );

        let config: SelectorConfig = toml::from_str("probe_timeout = \"2s\"").unwrap();
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }
}
