//! Error types for Quire

use std::time::Duration;

use thiserror::Error;

use crate::outcome::EventOutcome;

/// Top-level error type for Quire
#[derive(Debug, Error)]
pub enum QuireError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    NoReachableRelays(#[from] NoReachableRelaysError),

    #[error(transparent)]
    QuorumNotMet(#[from] QuorumNotMetError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while reading a document. Always fatal and always raised
/// before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Document has no title header")]
    MissingTitle,

    #[error("Document title is empty")]
    EmptyTitle,

    #[error("Second level-1 header at line {line}")]
    MultipleTitles { line: usize },

    #[error("Invalid metadata value for '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    #[error("Unknown event kind: {0}")]
    UnknownKind(u16),

    #[error("Invalid content level: {0} (expected 1..=6)")]
    InvalidContentLevel(u8),
}

/// Errors raised while linearizing the event graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Reference cycle between events: {}", .identifiers.join(", "))]
    Cycle { identifiers: Vec<String> },

    #[error("Event '{from}' references unknown event '{to}'")]
    DanglingReference { from: String, to: String },
}

/// No relay answered the liveness probe, fallback included
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No reachable relays (probed: {})", .probed.join(", "))]
pub struct NoReachableRelaysError {
    pub probed: Vec<String>,
}

/// A single relay attempt failed. Retried locally by the dissemination
/// engine and only ever surfaced as a recorded reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayAttemptError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Relay rejected event: {0}")]
    Rejected(String),

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Relay disconnected")]
    Disconnected,

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// An event did not reach the configured quorum of relays
#[derive(Debug, Clone, Error)]
#[error(
    "Quorum not met for event {} ({}/{} relays): {}",
    .outcome.identifier,
    .outcome.success_count,
    .outcome.quorum,
    describe_failures(.outcome)
)]
pub struct QuorumNotMetError {
    /// Full per-relay outcome, so callers can still report what happened
    pub outcome: Box<EventOutcome>,
}

impl QuorumNotMetError {
    pub fn new(outcome: EventOutcome) -> Self {
        Self {
            outcome: Box::new(outcome),
        }
    }

    /// `(relay, reason)` for every relay that did not acknowledge
    pub fn failures(&self) -> Vec<(String, String)> {
        self.outcome.failures()
    }
}

fn describe_failures(outcome: &EventOutcome) -> String {
    let failures = outcome.failures();
    if failures.is_empty() {
        return "no relays attempted".to_string();
    }
    failures
        .iter()
        .map(|(relay, reason)| format!("{relay}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The global run deadline passed before every planned event was dispatched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Run timed out after {timeout:?}; {} events not executed", .unexecuted.len())]
pub struct TimeoutError {
    pub timeout: Duration,
    /// Identifiers of the events that never reached a terminal state
    pub unexecuted: Vec<String>,
}

/// Errors from the signing collaborator. Never carries key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown relay category: {0}")]
    UnknownCategory(String),

    #[error("Invalid relay URL: {0}")]
    InvalidRelayUrl(String),

    #[error("Quorum must be at least 1, got {0}")]
    InvalidQuorum(usize),

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Content level must be in 1..=6, got {0}")]
    InvalidContentLevel(u8),

    #[error("Kind {0} is not registered")]
    UnregisteredKind(u16),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type alias for Quire operations
pub type QuireResult<T> = Result<T, QuireError>;
