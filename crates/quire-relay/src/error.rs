//! Relay layer errors

use quire_core::{ConfigError, NoReachableRelaysError, QuireError, QuorumNotMetError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error(transparent)]
    QuorumNotMet(#[from] QuorumNotMetError),

    #[error(transparent)]
    NoReachableRelays(#[from] NoReachableRelaysError),

    /// Every relay failed to answer a query
    #[error("Query failed on all {} relays: {}", .failures.len(), describe(.failures))]
    QueryFailed { failures: Vec<(String, String)> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn describe(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(relay, reason)| format!("{relay}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<RelayError> for QuireError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::QuorumNotMet(e) => QuireError::QuorumNotMet(e),
            RelayError::NoReachableRelays(e) => QuireError::NoReachableRelays(e),
            RelayError::Config(e) => QuireError::Config(e),
            RelayError::QueryFailed { failures } => {
                QuireError::NoReachableRelays(NoReachableRelaysError {
                    probed: failures.into_iter().map(|(relay, _)| relay).collect(),
                })
            }
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
