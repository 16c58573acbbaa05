//! Error types for the publish coordinator

use quire_core::{ConfigError, ParseError, PlanError, QuireError, SigningError, TimeoutError};
use quire_relay::RelayError;
use thiserror::Error;

/// Fatal errors of a publish or fetch call
///
/// Per-event quorum failures and run timeouts are not fatal; they are
/// recorded in the [`PublishReport`](crate::PublishReport) instead.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// No relay holds the requested index event
    #[error("Publication not found: {kind}:{identifier}")]
    NotFound { kind: u16, identifier: String },
}

impl From<QuireError> for PublisherError {
    fn from(err: QuireError) -> Self {
        match err {
            QuireError::Parse(e) => PublisherError::Parse(e),
            QuireError::Plan(e) => PublisherError::Plan(e),
            QuireError::Signing(e) => PublisherError::Signing(e),
            QuireError::Config(e) => PublisherError::Config(e),
            QuireError::Timeout(e) => PublisherError::Timeout(e),
            QuireError::NoReachableRelays(e) => PublisherError::Relay(e.into()),
            QuireError::QuorumNotMet(e) => PublisherError::Relay(e.into()),
        }
    }
}

/// Result type alias for publisher operations
pub type PublisherResult<T> = Result<T, PublisherError>;
