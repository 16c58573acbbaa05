//! Relay selection and liveness probing
//!
//! A [`RelaySpec`] names relays by URL, URL list or category. The selector
//! resolves it, probes every relay concurrently and keeps the ones that
//! answer. Liveness is probed on every call; nothing is cached between runs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use quire_core::{ConfigError, Filter, NoReachableRelaysError, RelayAttemptError, RelayClient, RelayUrl};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::{RelayCategories, SelectorConfig};
use crate::error::RelayResult;

/// Category used when nothing else names relays
pub const DEFAULT_CATEGORY: &str = "default";

/// Which relays to publish to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelaySpec {
    Url(RelayUrl),
    List(Vec<RelayUrl>),
    Category(String),
}

impl Default for RelaySpec {
    fn default() -> Self {
        RelaySpec::Category(DEFAULT_CATEGORY.to_string())
    }
}

impl RelaySpec {
    /// `wss://a` is a URL, `wss://a, wss://b` a list, anything else a category
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::UnknownCategory(String::new()));
        }
        if trimmed.contains(',') {
            let urls = trimmed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(RelayUrl::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(RelaySpec::List(urls));
        }
        if is_url(trimmed) {
            return RelayUrl::parse(trimmed).map(RelaySpec::Url);
        }
        Ok(RelaySpec::Category(trimmed.to_string()))
    }

    /// Concrete URLs, deduplicated in first-occurrence order
    pub fn resolve(&self, categories: &RelayCategories) -> Result<Vec<RelayUrl>, ConfigError> {
        let urls = match self {
            RelaySpec::Url(url) => vec![url.clone()],
            RelaySpec::List(urls) => urls.clone(),
            RelaySpec::Category(name) => categories.resolve(name)?,
        };
        let mut unique: Vec<RelayUrl> = Vec::with_capacity(urls.len());
        for url in urls {
            if !unique.contains(&url) {
                unique.push(url);
            }
        }
        Ok(unique)
    }
}

fn is_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("ws://") || lower.starts_with("wss://")
}

impl FromStr for RelaySpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RelaySpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelaySpec> for String {
    fn from(spec: RelaySpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for RelaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelaySpec::Url(url) => write!(f, "{url}"),
            RelaySpec::List(urls) => {
                let joined: Vec<&str> = urls.iter().map(RelayUrl::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
            RelaySpec::Category(name) => write!(f, "{name}"),
        }
    }
}

/// Result of probing one relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Liveness {
    Unknown,
    Live { latency_ms: u64 },
    Unreachable { reason: String },
}

impl Liveness {
    pub fn is_live(&self) -> bool {
        matches!(self, Liveness::Live { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEndpoint {
    pub url: RelayUrl,
    /// Configured category the URL came from, if any
    pub category: Option<String>,
    pub liveness: Liveness,
}

impl RelayEndpoint {
    pub fn new(url: RelayUrl, category: Option<String>) -> Self {
        Self {
            url,
            category,
            liveness: Liveness::Unknown,
        }
    }

    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }
}

/// Resolves relay specs into reachable endpoints
pub struct RelaySelector<C: RelayClient> {
    client: Arc<C>,
    categories: RelayCategories,
    config: SelectorConfig,
}

impl<C: RelayClient> RelaySelector<C> {
    pub fn new(client: Arc<C>, categories: RelayCategories, config: SelectorConfig) -> Self {
        Self {
            client,
            categories,
            config,
        }
    }

    pub fn categories(&self) -> &RelayCategories {
        &self.categories
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Resolve `spec`, probe the relays and return the live ones
    ///
    /// Falls back to the configured fallback relay when nothing answers.
    #[instrument(skip_all, fields(spec = %spec))]
    pub async fn select(&self, spec: &RelaySpec) -> RelayResult<Arc<[RelayEndpoint]>> {
        let urls = spec.resolve(&self.categories)?;
        let probed = self.probe_all(&urls).await;
        let live: Vec<RelayEndpoint> = probed.iter().filter(|e| e.is_live()).cloned().collect();
        if !live.is_empty() {
            info!(live = live.len(), configured = urls.len(), "Selected relays");
            return Ok(live.into());
        }

        let mut tried: Vec<String> = urls.iter().map(ToString::to_string).collect();
        if let Some(fallback) = self.config.fallback_relay.as_ref().filter(|f| !urls.contains(*f)) {
            warn!(fallback = %fallback, "No configured relay reachable, trying fallback");
            tried.push(fallback.to_string());
            let endpoint = self.probe(fallback).await;
            if endpoint.is_live() {
                return Ok(vec![endpoint].into());
            }
        }

        Err(NoReachableRelaysError { probed: tried }.into())
    }

    /// Probe every URL concurrently. Results keep the input order.
    pub async fn probe_all(&self, urls: &[RelayUrl]) -> Vec<RelayEndpoint> {
        let filter = self.probe_filter();
        let mut tasks = JoinSet::new();
        for (position, url) in urls.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let url = url.clone();
            let filter = filter.clone();
            let probe_timeout = self.config.probe_timeout;
            tasks.spawn(async move {
                let liveness = probe_liveness(client.as_ref(), &url, filter, probe_timeout).await;
                (position, liveness)
            });
        }

        let mut endpoints: Vec<RelayEndpoint> = urls
            .iter()
            .map(|url| self.endpoint_for(url))
            .collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, liveness)) => endpoints[position].liveness = liveness,
                Err(e) => warn!(error = %e, "Probe task failed"),
            }
        }
        for endpoint in &mut endpoints {
            if endpoint.liveness == Liveness::Unknown {
                endpoint.liveness = Liveness::Unreachable {
                    reason: "probe did not complete".to_string(),
                };
            }
        }
        endpoints
    }

    /// Probe a single relay
    pub async fn probe(&self, url: &RelayUrl) -> RelayEndpoint {
        let mut endpoint = self.endpoint_for(url);
        endpoint.liveness = probe_liveness(
            self.client.as_ref(),
            url,
            self.probe_filter(),
            self.config.probe_timeout,
        )
        .await;
        endpoint
    }

    fn endpoint_for(&self, url: &RelayUrl) -> RelayEndpoint {
        RelayEndpoint::new(
            url.clone(),
            self.categories.category_of(url).map(str::to_string),
        )
    }

    fn probe_filter(&self) -> Filter {
        Filter::new()
            .kinds(self.config.probe_kinds.iter().copied())
            .limit(1)
    }
}

/// Connect and run a one-event query within `probe_timeout`
async fn probe_liveness<C: RelayClient + ?Sized>(
    client: &C,
    url: &RelayUrl,
    filter: Filter,
    probe_timeout: Duration,
) -> Liveness {
    let started = Instant::now();
    let attempt = async {
        client.connect(url).await?;
        client.query(url, std::slice::from_ref(&filter)).await
    };
    let result = match timeout(probe_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(RelayAttemptError::Timeout(probe_timeout)),
    };
    if let Err(e) = client.disconnect(url).await {
        debug!(relay = %url, error = %e, "Disconnect after probe failed");
    }

    match result {
        Ok(_) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            debug!(relay = %url, latency_ms, "Relay is live");
            Liveness::Live { latency_ms }
        }
        Err(e) => {
            debug!(relay = %url, error = %e, "Relay probe failed");
            Liveness::Unreachable {
                reason: e.to_string(),
            }
        }
    }
}
