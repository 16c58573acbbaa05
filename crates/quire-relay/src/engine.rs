//! Dissemination engine
//!
//! Publishes one event to a set of relays concurrently, retrying each relay
//! independently with exponential backoff, then aggregates the per-relay
//! results against a quorum. Also runs deduplicating queries across relays.

use std::collections::HashSet;
use std::sync::Arc;

use quire_core::{
    ConfigError, EventId, EventOutcome, Filter, PublishOutcome, QuorumNotMetError,
    RelayAttemptError, RelayClient, RelayUrl, SignedEvent,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::DisseminationConfig;
use crate::delivery::RelayDeliveryState;
use crate::error::{RelayError, RelayResult};

/// Events returned by a multi-relay query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Unique by id, in relay-completion order
    pub events: Vec<SignedEvent>,
    /// Relays that answered
    pub responded: Vec<RelayUrl>,
    /// `(relay, reason)` for relays that did not answer
    pub failed_relays: Vec<(RelayUrl, String)>,
}

/// Publishes events and runs queries over a [`RelayClient`]
pub struct Disseminator<C: RelayClient> {
    client: Arc<C>,
    config: DisseminationConfig,
}

impl<C: RelayClient> Disseminator<C> {
    pub fn new(client: Arc<C>, config: DisseminationConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DisseminationConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Publish and require `quorum` acknowledgements
    ///
    /// On failure the error carries the full outcome.
    pub async fn publish(
        &self,
        event: &SignedEvent,
        relays: &[RelayUrl],
        quorum: usize,
    ) -> RelayResult<EventOutcome> {
        let outcome = self.disseminate(event, relays, quorum).await?;
        if outcome.is_durable() {
            Ok(outcome)
        } else {
            Err(QuorumNotMetError::new(outcome).into())
        }
    }

    /// Publish to every relay and aggregate, whatever the disposition
    ///
    /// Returns only after every relay task has settled.
    #[instrument(skip_all, fields(event_id = %event.id.short_id(), quorum = quorum))]
    pub async fn disseminate(
        &self,
        event: &SignedEvent,
        relays: &[RelayUrl],
        quorum: usize,
    ) -> RelayResult<EventOutcome> {
        if quorum == 0 {
            return Err(ConfigError::InvalidQuorum(quorum).into());
        }
        self.config.validate()?;
        if quorum > relays.len() {
            warn!(quorum, relays = relays.len(), "Quorum exceeds relay count and cannot be met");
        }

        let event = Arc::new(event.clone());
        let mut tasks = JoinSet::new();
        for url in relays {
            let client = Arc::clone(&self.client);
            let event = Arc::clone(&event);
            let url = url.clone();
            let config = self.config.clone();
            tasks.spawn(async move { deliver(client.as_ref(), &url, &event, &config).await });
        }

        // Single writer: only this task touches the aggregate
        let mut outcomes = Vec::with_capacity(relays.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Relay task failed"),
            }
        }
        for url in relays {
            if !outcomes.iter().any(|o| &o.relay_url == url) {
                outcomes.push(PublishOutcome::failed(event.id, url, 0, "relay task aborted"));
            }
        }

        let outcome = EventOutcome::aggregate(
            event.id,
            event.identifier().unwrap_or_default().to_string(),
            event.kind,
            quorum,
            outcomes,
        );
        info!(
            identifier = %outcome.identifier,
            success_count = outcome.success_count,
            relays = relays.len(),
            disposition = ?outcome.disposition,
            "Event disseminated"
        );
        Ok(outcome)
    }

    /// Close connections to `relays`
    ///
    /// Relay tasks close their own connections when they settle. This is
    /// for callers that drop a publish or query before it settles, which
    /// aborts those tasks.
    pub async fn release(&self, relays: &[RelayUrl]) {
        for url in relays {
            close(self.client.as_ref(), url).await;
        }
    }

    /// Send the same filters to every relay and merge the answers
    ///
    /// Events are deduplicated by id; the first relay to deliver one wins.
    #[instrument(skip_all, fields(relays = relays.len()))]
    pub async fn query(&self, filters: &[Filter], relays: &[RelayUrl]) -> RelayResult<QueryResult> {
        let filters: Arc<[Filter]> = filters.into();
        let mut tasks = JoinSet::new();
        for url in relays {
            let client = Arc::clone(&self.client);
            let filters = Arc::clone(&filters);
            let url = url.clone();
            let query_timeout = self.config.query_timeout;
            tasks.spawn(async move {
                let attempt = async {
                    client.connect(&url).await?;
                    client.query(&url, &filters).await
                };
                let result = match timeout(query_timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(RelayAttemptError::Timeout(query_timeout)),
                };
                close(client.as_ref(), &url).await;
                (url, result)
            });
        }

        let mut result = QueryResult::default();
        let mut seen: HashSet<EventId> = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let (url, answer) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Query task failed");
                    continue;
                }
            };
            match answer {
                Ok(events) => {
                    debug!(relay = %url, count = events.len(), "Relay answered query");
                    for event in events {
                        if seen.insert(event.id) {
                            result.events.push(event);
                        }
                    }
                    result.responded.push(url);
                }
                Err(e) => {
                    warn!(relay = %url, error = %e, "Relay query failed");
                    result.failed_relays.push((url, e.to_string()));
                }
            }
        }
        for url in relays {
            let accounted = result.responded.contains(url)
                || result.failed_relays.iter().any(|(u, _)| u == url);
            if !accounted {
                result
                    .failed_relays
                    .push((url.clone(), "query task aborted".to_string()));
            }
        }

        if !relays.is_empty() && result.responded.is_empty() {
            return Err(RelayError::QueryFailed {
                failures: result
                    .failed_relays
                    .into_iter()
                    .map(|(url, reason)| (url.to_string(), reason))
                    .collect(),
            });
        }
        Ok(result)
    }
}

/// Retry one relay until it acknowledges or attempts run out
async fn deliver<C: RelayClient + ?Sized>(
    client: &C,
    url: &RelayUrl,
    event: &SignedEvent,
    config: &DisseminationConfig,
) -> PublishOutcome {
    let mut delivery = RelayDeliveryState::new();
    while delivery.should_retry(config) {
        if delivery.consecutive_failures() > 0 {
            let backoff = delivery.backoff_duration(config);
            debug!(relay = %url, backoff_ms = backoff.as_millis() as u64, "Backing off");
            sleep(backoff).await;
        }
        delivery.begin_attempt();

        let attempt = async {
            client.connect(url).await?;
            client.publish(url, event).await
        };
        match timeout(config.attempt_timeout, attempt).await {
            Ok(Ok(())) => {
                debug!(relay = %url, attempt = delivery.attempts(), "Relay acknowledged");
                delivery.record_success();
            }
            Ok(Err(e)) => {
                debug!(relay = %url, attempt = delivery.attempts(), error = %e, "Attempt failed");
                delivery.record_failure(&e);
            }
            Err(_) => {
                debug!(relay = %url, attempt = delivery.attempts(), "Attempt timed out");
                delivery.record_failure(&RelayAttemptError::Timeout(config.attempt_timeout));
            }
        }
    }
    close(client, url).await;
    PublishOutcome::from_state(event.id, url, &delivery.finish())
}

/// Close the connection to `url`; a failure only costs a log line
async fn close<C: RelayClient + ?Sized>(client: &C, url: &RelayUrl) {
    if let Err(e) = client.disconnect(url).await {
        debug!(relay = %url, error = %e, "Disconnect failed");
    }
}
