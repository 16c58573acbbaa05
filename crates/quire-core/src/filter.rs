//! Query filters in relay JSON shape

use serde::{Deserialize, Serialize};

use crate::event::{EventId, SignedEvent};
use crate::identity::PublicKey;

/// A relay query filter
///
/// Empty lists mean "no constraint". Within one field values are OR-ed,
/// across fields they are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<EventId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<PublicKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,
    #[serde(rename = "#d", default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: EventId) -> Self {
        self.ids.push(id);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.authors.push(author);
        self
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifiers.push(identifier.into());
        self
    }

    pub fn identifiers<S: Into<String>>(mut self, identifiers: impl IntoIterator<Item = S>) -> Self {
        self.identifiers.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an event satisfies every constraint (ignores `limit`)
    pub fn matches(&self, event: &SignedEvent) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&event.id) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&event.pubkey) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.identifiers.is_empty() {
            match event.identifier() {
                Some(d) if self.identifiers.iter().any(|i| i == d) => {}
                _ => return false,
            }
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at > until) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventRecord, EventVariant};
    use crate::identity::testing::TestSigner;

    fn event(kind: u16, d: &str, created_at: u64) -> SignedEvent {
        let signer = TestSigner::signer(1);
        EventRecord {
            kind,
            identifier: d.to_string(),
            title: d.to_string(),
            variant: EventVariant::PublicationContent {
                content: "body".to_string(),
            },
            tags: Vec::new(),
            created_at,
        }
        .to_unsigned(signer.public_key())
        .sign(&signer)
        .unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&event(30041, "a", 1)));
    }

    #[test]
    fn test_kind_and_identifier_constraints() {
        let ev = event(30041, "intro", 5);
        assert!(Filter::new().kind(30041).identifier("intro").matches(&ev));
        assert!(!Filter::new().kind(30040).matches(&ev));
        assert!(!Filter::new().identifier("other").matches(&ev));
        assert!(Filter::new().kinds([30040, 30041]).matches(&ev));
    }

    #[test]
    fn test_time_window() {
        let ev = event(30041, "a", 100);
        assert!(Filter::new().since(100).until(100).matches(&ev));
        assert!(!Filter::new().since(101).matches(&ev));
        assert!(!Filter::new().until(99).matches(&ev));
    }

    #[test]
    fn test_author_and_id_constraints() {
        let ev = event(30041, "a", 1);
        assert!(Filter::new().author(ev.pubkey).id(ev.id).matches(&ev));
        let stranger = TestSigner::signer(2).public_key();
        assert!(!Filter::new().author(stranger).matches(&ev));
    }

    #[test]
    fn test_json_shape() {
        let filter = Filter::new().kinds([30040, 30041]).identifier("book").limit(1);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["kinds"], serde_json::json!([30040, 30041]));
        assert_eq!(value["#d"], serde_json::json!(["book"]));
        assert_eq!(value["limit"], 1);
        assert!(value.get("ids").is_none());
        assert!(value.get("since").is_none());
    }
}
