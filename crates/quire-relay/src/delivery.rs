//! Per-relay delivery state
//!
//! Tracks one event's attempts against one relay: the attempt counter,
//! consecutive failures driving the backoff, and the last failure reason.

use std::time::Duration;

use quire_core::{RelayAttemptError, RelayState};

use crate::config::DisseminationConfig;

/// Backoff before the next attempt: `base * 2^(failures - 1)`, capped at `max`
pub fn backoff_for(failures: u32, base: Duration, max: Duration) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    // 2^16 * base already exceeds any sane cap
    let factor = 1u32 << (failures - 1).min(16);
    base.saturating_mul(factor).min(max)
}

#[derive(Debug, Clone)]
pub struct RelayDeliveryState {
    state: RelayState,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl Default for RelayDeliveryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayDeliveryState {
    pub fn new() -> Self {
        Self {
            state: RelayState::Pending,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.state.attempts()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether another attempt is allowed under `config`
    pub fn should_retry(&self, config: &DisseminationConfig) -> bool {
        !self.state.is_terminal() && self.attempts() < config.max_attempts
    }

    pub fn backoff_duration(&self, config: &DisseminationConfig) -> Duration {
        backoff_for(self.consecutive_failures, config.base_backoff, config.max_backoff)
    }

    pub fn begin_attempt(&mut self) {
        self.state.begin_attempt();
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state.confirm();
    }

    pub fn record_failure(&mut self, error: &RelayAttemptError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
    }

    /// Settle into a terminal state. Anything not confirmed has failed.
    pub fn finish(mut self) -> RelayState {
        if !self.state.is_terminal() {
            let reason = self
                .last_error
                .take()
                .unwrap_or_else(|| "no attempt was made".to_string());
            self.state.fail(reason);
        }
        self.state
    }
}
