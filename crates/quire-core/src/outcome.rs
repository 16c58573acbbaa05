//! Publish outcomes and the per-event state machine
//!
//! Each relay attempt for an event moves through
//! `Pending → Publishing → Confirmed | Failed`. Once every relay is
//! terminal, the per-relay results aggregate into a [`Disposition`]:
//! `Durable` (quorum reached), `PartiallyPublished` (some but not enough)
//! or `Failed` (none).

use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::transport::RelayUrl;

/// Per-relay state of one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelayState {
    Pending,
    Publishing { attempt: u32 },
    Confirmed { attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Confirmed { .. } | RelayState::Failed { .. })
    }

    /// Enter the next attempt
    pub fn begin_attempt(&mut self) {
        let attempt = match self {
            RelayState::Publishing { attempt } => *attempt + 1,
            _ => 1,
        };
        *self = RelayState::Publishing { attempt };
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RelayState::Pending => 0,
            RelayState::Publishing { attempt } => *attempt,
            RelayState::Confirmed { attempts } | RelayState::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn confirm(&mut self) {
        *self = RelayState::Confirmed {
            attempts: self.attempts(),
        };
    }

    pub fn fail(&mut self, last_error: impl Into<String>) {
        *self = RelayState::Failed {
            attempts: self.attempts(),
            last_error: last_error.into(),
        };
    }
}

/// Final result of publishing one event to one relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub event_id: EventId,
    pub relay_url: RelayUrl,
    pub success: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl PublishOutcome {
    pub fn confirmed(event_id: EventId, relay_url: &RelayUrl, attempts: u32) -> Self {
        Self {
            event_id,
            relay_url: relay_url.clone(),
            success: true,
            attempts,
            last_error: None,
        }
    }

    pub fn failed(
        event_id: EventId,
        relay_url: &RelayUrl,
        attempts: u32,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            relay_url: relay_url.clone(),
            success: false,
            attempts,
            last_error: Some(last_error.into()),
        }
    }

    /// Convert a terminal relay state. A state that never finished is
    /// reported as a failure.
    pub fn from_state(event_id: EventId, relay_url: &RelayUrl, state: &RelayState) -> Self {
        match state {
            RelayState::Confirmed { attempts } => Self::confirmed(event_id, relay_url, *attempts),
            RelayState::Failed {
                attempts,
                last_error,
            } => Self::failed(event_id, relay_url, *attempts, last_error.clone()),
            other => Self::failed(event_id, relay_url, other.attempts(), "attempt did not finish"),
        }
    }
}

/// Aggregate state of one event across relays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Acknowledged by at least `quorum` relays
    Durable,
    /// Acknowledged by some relays, fewer than `quorum`
    PartiallyPublished,
    /// Acknowledged by no relay
    Failed,
}

impl Disposition {
    pub fn from_counts(success_count: usize, quorum: usize) -> Self {
        if success_count >= quorum && success_count > 0 {
            Disposition::Durable
        } else if success_count > 0 {
            Disposition::PartiallyPublished
        } else {
            Disposition::Failed
        }
    }
}

/// Outcome of one event across every relay it was sent to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub event_id: EventId,
    pub identifier: String,
    pub kind: u16,
    pub quorum: usize,
    pub outcomes: Vec<PublishOutcome>,
    /// Relays that actually acknowledged
    pub success_count: usize,
    pub disposition: Disposition,
}

impl EventOutcome {
    pub fn aggregate(
        event_id: EventId,
        identifier: String,
        kind: u16,
        quorum: usize,
        outcomes: Vec<PublishOutcome>,
    ) -> Self {
        let success_count = outcomes.iter().filter(|o| o.success).count();
        Self {
            event_id,
            identifier,
            kind,
            quorum,
            disposition: Disposition::from_counts(success_count, quorum),
            outcomes,
            success_count,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.disposition == Disposition::Durable
    }

    /// `(relay, reason)` for every relay that did not acknowledge
    pub fn failures(&self) -> Vec<(String, String)> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| {
                (
                    o.relay_url.to_string(),
                    o.last_error.clone().unwrap_or_else(|| "unknown error".into()),
                )
            })
            .collect()
    }

    pub fn confirmed_relays(&self) -> Vec<&RelayUrl> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| &o.relay_url)
            .collect()
    }
}
