//! Publish run report
//!
//! The report lists every planned event and, for a real run, every
//! event's per-relay outcome, even when the run failed part way. Callers
//! use [`PublishReport::retry_identifiers`] to republish only what did not
//! become durable; reused identifiers make that retry idempotent.

use std::time::Duration;

use quire_compiler::ParseWarning;
use quire_core::{
    Disposition, EventId, EventOutcome, EventRecord, KindRole, QuorumNotMetError, RelayUrl,
    TimeoutError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the publish plan, in dispatch order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEvent {
    pub position: usize,
    pub kind: u16,
    pub role: KindRole,
    pub identifier: String,
    pub title: String,
    /// `kind:pubkey:identifier` coordinates this event references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    pub root: bool,
    /// Set once the event is signed; dry runs never sign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
}

impl PlannedEvent {
    pub fn from_record(position: usize, record: &EventRecord, root: bool) -> Self {
        Self {
            position,
            kind: record.kind,
            role: record.variant.role(),
            identifier: record.identifier.clone(),
            title: record.title.clone(),
            references: record.references().iter().map(|r| r.coordinate()).collect(),
            root,
            event_id: None,
        }
    }
}

/// A non-fatal problem recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ReportError {
    /// An event was not acknowledged by enough relays. Fatal to the run
    /// only when `root` is set.
    QuorumNotMet {
        identifier: String,
        event_id: EventId,
        root: bool,
        quorum: usize,
        success_count: usize,
        /// `(relay, reason)` per relay that did not acknowledge
        failures: Vec<(String, String)>,
    },
    /// The run deadline passed before these events finished
    Timeout {
        timeout_ms: u64,
        unexecuted: Vec<String>,
    },
    /// Dissemination of one event could not start
    Dissemination { identifier: String, message: String },
}

impl ReportError {
    pub fn quorum_not_met(error: &QuorumNotMetError, root: bool) -> Self {
        ReportError::QuorumNotMet {
            identifier: error.outcome.identifier.clone(),
            event_id: error.outcome.event_id,
            root,
            quorum: error.outcome.quorum,
            success_count: error.outcome.success_count,
            failures: error.failures(),
        }
    }

    pub fn timeout(error: &TimeoutError) -> Self {
        ReportError::Timeout {
            timeout_ms: u64::try_from(error.timeout.as_millis()).unwrap_or(u64::MAX),
            unexecuted: error.unexecuted.clone(),
        }
    }

    /// Whether this error alone makes the run unsuccessful
    pub fn is_fatal(&self) -> bool {
        match self {
            ReportError::QuorumNotMet { root, .. } => *root,
            ReportError::Timeout { .. } | ReportError::Dissemination { .. } => true,
        }
    }

    pub fn into_timeout_error(self) -> Option<TimeoutError> {
        match self {
            ReportError::Timeout {
                timeout_ms,
                unexecuted,
            } => Some(TimeoutError {
                timeout: Duration::from_millis(timeout_ms),
                unexecuted,
            }),
            _ => None,
        }
    }
}

/// Result of one publish invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    /// Root event durable, no timeout, nothing fatal
    pub success: bool,
    pub dry_run: bool,
    pub document_title: String,
    pub total_expected_events: usize,
    /// Events acknowledged by at least one relay
    pub total_published_events: usize,
    pub plan: Vec<PlannedEvent>,
    /// Relays the run published to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<RelayUrl>,
    pub outcomes: Vec<EventOutcome>,
    pub errors: Vec<ReportError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

impl PublishReport {
    pub fn new(run_id: Uuid, document_title: impl Into<String>, plan: Vec<PlannedEvent>) -> Self {
        Self {
            run_id,
            success: false,
            dry_run: false,
            document_title: document_title.into(),
            total_expected_events: plan.len(),
            total_published_events: 0,
            plan,
            relays: Vec::new(),
            outcomes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn root_identifier(&self) -> Option<&str> {
        self.plan
            .iter()
            .find(|e| e.root)
            .map(|e| e.identifier.as_str())
    }

    pub fn root_outcome(&self) -> Option<&EventOutcome> {
        let root = self.plan.iter().find(|e| e.root)?;
        self.outcomes
            .iter()
            .find(|o| o.kind == root.kind && o.identifier == root.identifier)
    }

    pub fn outcome(&self, identifier: &str) -> Option<&EventOutcome> {
        self.outcomes.iter().find(|o| o.identifier == identifier)
    }

    pub fn timed_out(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, ReportError::Timeout { .. }))
    }

    /// Recompute `success` and `total_published_events` from the outcomes
    pub fn finalize(&mut self) {
        self.total_published_events = self.outcomes.iter().filter(|o| o.success_count > 0).count();
        self.success = if self.dry_run {
            self.errors.iter().all(|e| !e.is_fatal())
        } else {
            self.root_outcome().is_some_and(EventOutcome::is_durable)
                && self.errors.iter().all(|e| !e.is_fatal())
        };
    }

    /// Identifiers of events that are not durable, in plan order
    ///
    /// Covers events that fell short of quorum and events the run never
    /// dispatched.
    pub fn retry_identifiers(&self) -> Vec<&str> {
        if self.dry_run {
            return Vec::new();
        }
        self.plan
            .iter()
            .filter(|planned| {
                !self.outcomes.iter().any(|o| {
                    o.identifier == planned.identifier
                        && o.kind == planned.kind
                        && o.disposition == Disposition::Durable
                })
            })
            .map(|planned| planned.identifier.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use quire_core::PublishOutcome;

    use super::*;

    fn planned(position: usize, identifier: &str, root: bool) -> PlannedEvent {
        PlannedEvent {
            position,
            kind: if root { 30040 } else { 30041 },
            role: if root {
                KindRole::PublicationIndex
            } else {
                KindRole::PublicationContent
            },
            identifier: identifier.to_string(),
            title: identifier.to_string(),
            references: Vec::new(),
            root,
            event_id: None,
        }
    }

    fn outcome(identifier: &str, kind: u16, acknowledged: usize, relays: usize) -> EventOutcome {
        let id = EventId::from_bytes([identifier.len() as u8; 32]);
        let outcomes = (0..relays)
            .map(|i| {
                let url = RelayUrl::parse(&format!("wss://r{i}.test")).unwrap();
                if i < acknowledged {
                    PublishOutcome::confirmed(id, &url, 1)
                } else {
                    PublishOutcome::failed(id, &url, 3, "refused")
                }
            })
            .collect();
        EventOutcome::aggregate(id, identifier.to_string(), kind, 2, outcomes)
    }

    fn report() -> PublishReport {
        PublishReport::new(
            Uuid::new_v4(),
            "Book",
            vec![planned(0, "s1", false), planned(1, "s2", false), planned(2, "book", true)],
        )
    }

    #[test]
    fn test_success_requires_durable_root() {
        let mut report = report();
        report.outcomes = vec![
            outcome("s1", 30041, 2, 2),
            outcome("s2", 30041, 1, 2),
            outcome("book", 30040, 2, 2),
        ];
        report.errors.push(ReportError::QuorumNotMet {
            identifier: "s2".to_string(),
            event_id: report.outcomes[1].event_id,
            root: false,
            quorum: 2,
            success_count: 1,
            failures: report.outcomes[1].failures(),
        });
        report.finalize();

        assert!(report.success);
        assert_eq!(report.total_expected_events, 3);
        assert_eq!(report.total_published_events, 3);
        assert_eq!(report.retry_identifiers(), vec!["s2"]);
    }

    #[test]
    fn test_root_failure_fails_run() {
        let mut report = report();
        report.outcomes = vec![
            outcome("s1", 30041, 2, 2),
            outcome("s2", 30041, 2, 2),
            outcome("book", 30040, 0, 2),
        ];
        report.finalize();

        assert!(!report.success);
        assert_eq!(report.total_published_events, 2);
        assert_eq!(report.retry_identifiers(), vec!["book"]);
    }

    #[test]
    fn test_timeout_fails_run() {
        let mut report = report();
        report.outcomes = vec![outcome("s1", 30041, 2, 2)];
        report.errors.push(ReportError::timeout(&TimeoutError {
            timeout: Duration::from_secs(1),
            unexecuted: vec!["s2".to_string(), "book".to_string()],
        }));
        report.finalize();

        assert!(!report.success);
        assert!(report.timed_out());
        assert_eq!(report.retry_identifiers(), vec!["s2", "book"]);
        let timeout = report.errors.pop().unwrap().into_timeout_error().unwrap();
        assert_eq!(timeout.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_dry_run_report() {
        let mut report = report();
        report.dry_run = true;
        report.finalize();

        assert!(report.success);
        assert_eq!(report.total_published_events, 0);
        assert!(report.retry_identifiers().is_empty());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut report = report();
        report.errors.push(ReportError::Dissemination {
            identifier: "s1".to_string(),
            message: "quorum must be at least 1".to_string(),
        });
        let json = report.to_json().unwrap();
        assert!(json.contains("\"document_title\": \"Book\""));
        assert!(json.contains("\"error\": \"dissemination\""));

        let parsed: PublishReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
