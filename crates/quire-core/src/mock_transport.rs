//! Mock relay network for testing
//!
//! Provides in-memory relays for testing selection, dissemination and
//! query logic without real websocket connections.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_core::{MockRelayBehavior, MockRelayNetwork, RelayClient, RelayUrl};
//!
//! let network = MockRelayNetwork::new();
//! let good = network.add_relay("wss://good.test");
//! let flaky = network.add_relay_with("wss://flaky.test", MockRelayBehavior::failing_first(2));
//! let down = network.add_relay_with("wss://down.test", MockRelayBehavior::unreachable());
//!
//! network.connect(&good).await.unwrap();
//! network.publish(&good, &event).await.unwrap();
//! assert_eq!(network.stored_events(&good).len(), 1);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::RelayAttemptError;
use crate::event::SignedEvent;
use crate::filter::Filter;
use crate::transport::{RelayClient, RelayUrl};

/// Scripted behaviour of one mock relay
#[derive(Debug, Clone, Default)]
pub struct MockRelayBehavior {
    /// Unreachable relays fail every connect
    pub unreachable: bool,
    /// Number of initial publish attempts that are rejected
    pub fail_first_publishes: u32,
    /// Reject every publish
    pub reject_all: bool,
    /// Fail every query even when reachable
    pub fail_queries: bool,
    /// Delay applied to every operation
    pub latency: Duration,
}

impl MockRelayBehavior {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first_publishes: n,
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug, Default)]
struct MockRelayState {
    behavior: MockRelayBehavior,
    events: Vec<SignedEvent>,
    publish_attempts: u32,
    connects: u32,
    disconnects: u32,
    /// Set by a successful connect, cleared by disconnect
    connected: bool,
    queries: u32,
}

/// A set of in-memory relays addressed by URL
///
/// Cloning shares the underlying relays, so a test can keep a handle for
/// inspection while the engine under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockRelayNetwork {
    relays: Arc<DashMap<RelayUrl, MockRelayState>>,
}

impl MockRelayNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a healthy relay
    ///
    /// # Panics
    ///
    /// Panics on an invalid URL; mock URLs are test constants.
    pub fn add_relay(&self, url: &str) -> RelayUrl {
        self.add_relay_with(url, MockRelayBehavior::healthy())
    }

    pub fn add_relay_with(&self, url: &str, behavior: MockRelayBehavior) -> RelayUrl {
        let url = RelayUrl::parse(url).expect("mock relay URL must be valid");
        self.relays.insert(
            url.clone(),
            MockRelayState {
                behavior,
                ..Default::default()
            },
        );
        url
    }

    pub fn set_behavior(&self, url: &RelayUrl, behavior: MockRelayBehavior) {
        if let Some(mut state) = self.relays.get_mut(url) {
            state.behavior = behavior;
        }
    }

    pub fn set_unreachable(&self, url: &RelayUrl, unreachable: bool) {
        if let Some(mut state) = self.relays.get_mut(url) {
            state.behavior.unreachable = unreachable;
        }
    }

    /// Store an event directly, bypassing publish
    pub fn seed_event(&self, url: &RelayUrl, event: SignedEvent) {
        if let Some(mut state) = self.relays.get_mut(url) {
            store(&mut state.events, event);
        }
    }

    pub fn stored_events(&self, url: &RelayUrl) -> Vec<SignedEvent> {
        self.relays
            .get(url)
            .map(|state| state.events.clone())
            .unwrap_or_default()
    }

    pub fn publish_attempts(&self, url: &RelayUrl) -> u32 {
        self.relays.get(url).map(|s| s.publish_attempts).unwrap_or(0)
    }

    pub fn connect_attempts(&self, url: &RelayUrl) -> u32 {
        self.relays.get(url).map(|s| s.connects).unwrap_or(0)
    }

    pub fn query_count(&self, url: &RelayUrl) -> u32 {
        self.relays.get(url).map(|s| s.queries).unwrap_or(0)
    }

    pub fn disconnects(&self, url: &RelayUrl) -> u32 {
        self.relays.get(url).map(|s| s.disconnects).unwrap_or(0)
    }

    pub fn is_connected(&self, url: &RelayUrl) -> bool {
        self.relays.get(url).is_some_and(|s| s.connected)
    }

    /// Relays currently holding an open connection
    pub fn open_connections(&self) -> Vec<RelayUrl> {
        let mut open: Vec<RelayUrl> = self
            .relays
            .iter()
            .filter(|entry| entry.connected)
            .map(|entry| entry.key().clone())
            .collect();
        open.sort();
        open
    }

    /// Total publish attempts across every relay
    pub fn total_publish_attempts(&self) -> u32 {
        self.relays.iter().map(|entry| entry.publish_attempts).sum()
    }

    fn latency(&self, url: &RelayUrl) -> Duration {
        self.relays
            .get(url)
            .map(|s| s.behavior.latency)
            .unwrap_or_default()
    }
}

/// Addressable events replace older versions with the same address
///
/// The newer `created_at` wins; on a tie the lower id wins.
fn store(events: &mut Vec<SignedEvent>, event: SignedEvent) {
    if events.iter().any(|e| e.id == event.id) {
        return;
    }
    if event.is_addressable() {
        let address = event.address();
        if let Some(position) = events.iter().position(|e| e.address() == address) {
            let current = &events[position];
            let replaces = event.created_at > current.created_at
                || (event.created_at == current.created_at && event.id < current.id);
            if !replaces {
                return;
            }
            events.remove(position);
        }
    }
    events.push(event);
}

#[async_trait]
impl RelayClient for MockRelayNetwork {
    async fn connect(&self, url: &RelayUrl) -> Result<(), RelayAttemptError> {
        let latency = self.latency(url);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self
            .relays
            .get_mut(url)
            .ok_or_else(|| RelayAttemptError::ConnectFailed(format!("{url}: unknown host")))?;
        state.connects += 1;
        if state.behavior.unreachable {
            return Err(RelayAttemptError::ConnectFailed(format!(
                "{url}: connection refused"
            )));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self, url: &RelayUrl) -> Result<(), RelayAttemptError> {
        if let Some(mut state) = self.relays.get_mut(url) {
            state.disconnects += 1;
            state.connected = false;
        }
        Ok(())
    }

    async fn publish(&self, url: &RelayUrl, event: &SignedEvent) -> Result<(), RelayAttemptError> {
        let latency = self.latency(url);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self
            .relays
            .get_mut(url)
            .ok_or(RelayAttemptError::Disconnected)?;
        state.publish_attempts += 1;
        if state.behavior.unreachable {
            return Err(RelayAttemptError::Disconnected);
        }
        if state.behavior.reject_all {
            return Err(RelayAttemptError::Rejected("blocked: not accepting events".into()));
        }
        if state.publish_attempts <= state.behavior.fail_first_publishes {
            return Err(RelayAttemptError::Rejected("error: try again later".into()));
        }
        store(&mut state.events, event.clone());
        Ok(())
    }

    async fn query(
        &self,
        url: &RelayUrl,
        filters: &[Filter],
    ) -> Result<Vec<SignedEvent>, RelayAttemptError> {
        let latency = self.latency(url);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self
            .relays
            .get_mut(url)
            .ok_or(RelayAttemptError::Disconnected)?;
        state.queries += 1;
        if state.behavior.unreachable {
            return Err(RelayAttemptError::Disconnected);
        }
        if state.behavior.fail_queries {
            return Err(RelayAttemptError::QueryFailed("error: internal".into()));
        }

        let mut results: Vec<SignedEvent> = Vec::new();
        for filter in filters {
            let mut matched: Vec<&SignedEvent> =
                state.events.iter().filter(|e| filter.matches(e)).collect();
            // Relays return newest first
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = filter.limit {
                matched.truncate(limit);
            }
            for event in matched {
                if !results.iter().any(|e| e.id == event.id) {
                    results.push(event.clone());
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventRecord, EventVariant};
    use crate::identity::testing::TestSigner;

    fn event(d: &str, created_at: u64) -> SignedEvent {
        let signer = TestSigner::signer(1);
        EventRecord {
            kind: 30041,
            identifier: d.to_string(),
            title: d.to_string(),
            variant: EventVariant::PublicationContent {
                content: format!("{d} at {created_at}"),
            },
            tags: Vec::new(),
            created_at,
        }
        .to_unsigned(signer.public_key())
        .sign(&signer)
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_query() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay("wss://relay.test");

        network.connect(&url).await.unwrap();
        network.publish(&url, &event("a", 1)).await.unwrap();
        network.publish(&url, &event("b", 2)).await.unwrap();

        let all = network.query(&url, &[Filter::new()]).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].identifier(), Some("b"));

        let limited = network.query(&url, &[Filter::new().limit(1)]).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_addressable_replacement() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay("wss://relay.test");

        network.publish(&url, &event("a", 1)).await.unwrap();
        network.publish(&url, &event("a", 5)).await.unwrap();
        // An older version does not replace the newer one
        network.publish(&url, &event("a", 3)).await.unwrap();

        let stored = network.stored_events(&url);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].created_at, 5);
    }

    #[tokio::test]
    async fn test_same_second_versions_keep_lower_id() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay("wss://relay.test");
        let signer = TestSigner::signer(1);
        let version = |content: &str| {
            EventRecord {
                kind: 30041,
                identifier: "a".to_string(),
                title: "a".to_string(),
                variant: EventVariant::PublicationContent {
                    content: content.to_string(),
                },
                tags: Vec::new(),
                created_at: 7,
            }
            .to_unsigned(signer.public_key())
            .sign(&signer)
            .unwrap()
        };
        let (first, second) = (version("one"), version("two"));
        let lower = if first.id < second.id { first.id } else { second.id };

        network.publish(&url, &first).await.unwrap();
        network.publish(&url, &second).await.unwrap();
        assert_eq!(network.stored_events(&url)[0].id, lower);

        // Arrival order does not matter
        let other = network.add_relay("wss://other.test");
        network.publish(&other, &second).await.unwrap();
        network.publish(&other, &first).await.unwrap();
        assert_eq!(network.stored_events(&other)[0].id, lower);
        assert_eq!(network.stored_events(&other).len(), 1);
    }

    #[tokio::test]
    async fn test_connection_tracking() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay("wss://relay.test");
        let down = network.add_relay_with("wss://down.test", MockRelayBehavior::unreachable());

        network.connect(&url).await.unwrap();
        let _ = network.connect(&down).await;
        assert!(network.is_connected(&url));
        assert!(!network.is_connected(&down));
        assert_eq!(network.open_connections(), vec![url.clone()]);

        network.disconnect(&url).await.unwrap();
        assert!(network.open_connections().is_empty());
        assert_eq!(network.disconnects(&url), 1);
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay_with("wss://down.test", MockRelayBehavior::unreachable());

        assert!(matches!(
            network.connect(&url).await,
            Err(RelayAttemptError::ConnectFailed(_))
        ));
        assert!(network.query(&url, &[Filter::new()]).await.is_err());
        assert_eq!(network.connect_attempts(&url), 1);
    }

    #[tokio::test]
    async fn test_scripted_publish_failures() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay_with("wss://flaky.test", MockRelayBehavior::failing_first(2));
        let ev = event("a", 1);

        assert!(matches!(
            network.publish(&url, &ev).await,
            Err(RelayAttemptError::Rejected(_))
        ));
        assert!(network.publish(&url, &ev).await.is_err());
        assert!(network.publish(&url, &ev).await.is_ok());
        assert_eq!(network.publish_attempts(&url), 3);
        assert_eq!(network.stored_events(&url).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_relay() {
        let network = MockRelayNetwork::new();
        let url = RelayUrl::parse("wss://nowhere.test").unwrap();
        assert!(network.connect(&url).await.is_err());
        assert!(network.publish(&url, &event("a", 1)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let network = MockRelayNetwork::new();
        let url = network.add_relay_with(
            "wss://slow.test",
            MockRelayBehavior::healthy().with_latency(Duration::from_secs(3)),
        );
        let start = tokio::time::Instant::now();
        network.connect(&url).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
