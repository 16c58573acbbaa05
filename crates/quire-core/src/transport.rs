//! Relay transport abstraction
//!
//! The [`RelayClient`] trait is the seam between Quire and whatever speaks
//! the relay wire protocol. Quire only needs four primitives: connect,
//! publish, query and disconnect. Subscription multiplexing, proof of work
//! and capability negotiation stay on the other side of this trait.
//!
//! ## Implementations
//!
//! - [`MockRelayNetwork`](crate::mock_transport::MockRelayNetwork): in-memory relays for testing
//! - a websocket client supplied by the embedding application

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RelayAttemptError};
use crate::event::SignedEvent;
use crate::filter::Filter;

/// A normalized relay websocket URL
///
/// Trimmed, without trailing slashes, and restricted to `ws://` / `wss://`.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct RelayUrl(String);

impl RelayUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let lower = trimmed.to_ascii_lowercase();
        let host = lower
            .strip_prefix("wss://")
            .or_else(|| lower.strip_prefix("ws://"))
            .ok_or_else(|| ConfigError::InvalidRelayUrl(raw.to_string()))?;
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidRelayUrl(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelayUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelayUrl> for String {
    fn from(url: RelayUrl) -> Self {
        url.0
    }
}

/// Primitive relay operations
///
/// Implementations must be safe to call concurrently for different URLs.
/// Every call is a suspension point; callers bound each one with a timeout.
///
/// # Example
///
/// ```rust,ignore
/// use quire_core::{Filter, RelayClient, RelayUrl};
///
/// async fn latest<C: RelayClient>(client: &C, url: &RelayUrl) -> usize {
///     client.connect(url).await.ok();
///     let filter = Filter::new().kind(30040).limit(1);
///     client.query(url, &[filter]).await.map(|e| e.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait RelayClient: Send + Sync + 'static {
    /// Ensure a connection to the relay exists
    ///
    /// Returns immediately if already connected.
    async fn connect(&self, url: &RelayUrl) -> Result<(), RelayAttemptError>;

    /// Publish an event and wait for the relay's acknowledgement
    async fn publish(&self, url: &RelayUrl, event: &SignedEvent) -> Result<(), RelayAttemptError>;

    /// Run the filters and wait for the relay to signal end of stored events
    async fn query(
        &self,
        url: &RelayUrl,
        filters: &[Filter],
    ) -> Result<Vec<SignedEvent>, RelayAttemptError>;

    /// Close the connection
    ///
    /// Callers close every connection they open, on success and failure
    /// alike. The default does nothing, for clients without connection state.
    async fn disconnect(&self, _url: &RelayUrl) -> Result<(), RelayAttemptError> {
        Ok(())
    }
}
