//! Publish planning
//!
//! Orders events so every referenced event precedes the index that
//! references it. Ties are broken by document order.

use std::collections::{HashMap, HashSet};

use quire_core::{EventRecord, PlanError, PublicKey};
use serde::{Deserialize, Serialize};

use crate::graph::EventGraph;

/// Events in publish order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPlan {
    events: Vec<EventRecord>,
    root: usize,
}

impl PublishPlan {
    pub fn from_graph(graph: &EventGraph) -> Result<Self, PlanError> {
        Self::from_records(graph.records(), graph.author(), 0)
    }

    /// Topologically sort `records` (given in document order) by their
    /// references. `root` is the position of the root event in `records`.
    pub fn from_records(
        records: Vec<EventRecord>,
        author: PublicKey,
        root: usize,
    ) -> Result<Self, PlanError> {
        let positions: HashMap<(u16, &str), usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.kind, r.identifier.as_str()), i))
            .collect();

        let mut in_degree = vec![0usize; records.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        for (i, record) in records.iter().enumerate() {
            let mut seen = HashSet::new();
            for reference in record.references() {
                let target = (reference.author == author)
                    .then(|| positions.get(&(reference.kind, reference.identifier.as_str())))
                    .flatten()
                    .ok_or_else(|| PlanError::DanglingReference {
                        from: record.identifier.clone(),
                        to: reference.coordinate(),
                    })?;
                if seen.insert(*target) {
                    in_degree[i] += 1;
                    dependents[*target].push(i);
                }
            }
        }

        let mut order = Vec::with_capacity(records.len());
        let mut ready: Vec<usize> = (0..records.len()).filter(|&i| in_degree[i] == 0).collect();
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &i in &ready {
                order.push(i);
                for &dependent in &dependents[i] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            ready = next;
        }

        if order.len() < records.len() {
            let identifiers = (0..records.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| records[i].identifier.clone())
                .collect();
            return Err(PlanError::Cycle { identifiers });
        }

        let root_position = order.iter().position(|&i| i == root).unwrap_or(0);
        let mut slots: Vec<Option<EventRecord>> = records.into_iter().map(Some).collect();
        let events = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        Ok(Self {
            events,
            root: root_position,
        })
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EventRecord> {
        self.events
    }

    pub fn root(&self) -> &EventRecord {
        &self.events[self.root]
    }

    /// Position of the root event in the plan
    pub fn root_position(&self) -> usize {
        self.root
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.identifier.as_str()).collect()
    }

    pub fn position(&self, kind: u16, identifier: &str) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.kind == kind && e.identifier == identifier)
    }
}

#[cfg(test)]
mod tests {
    use quire_core::{EventVariant, Reference};

    use super::*;

    fn author() -> PublicKey {
        PublicKey::from_bytes([2; 32])
    }

    fn content(id: &str) -> EventRecord {
        EventRecord {
            kind: 30041,
            identifier: id.to_string(),
            title: id.to_string(),
            variant: EventVariant::PublicationContent {
                content: String::new(),
            },
            tags: Vec::new(),
            created_at: 0,
        }
    }

    fn index(id: &str, children: &[(u16, &str)]) -> EventRecord {
        EventRecord {
            kind: 30040,
            identifier: id.to_string(),
            title: id.to_string(),
            variant: EventVariant::PublicationIndex {
                references: children
                    .iter()
                    .map(|(k, c)| Reference::new(*k, author(), *c))
                    .collect(),
                content: String::new(),
            },
            tags: Vec::new(),
            created_at: 0,
        }
    }

    #[test]
    fn test_leaves_first_in_document_order() {
        let records = vec![
            index("book", &[(30040, "ch1"), (30040, "ch2")]),
            index("ch1", &[(30041, "s1"), (30041, "s2")]),
            content("s1"),
            content("s2"),
            index("ch2", &[(30041, "s3")]),
            content("s3"),
        ];
        let plan = PublishPlan::from_records(records, author(), 0).unwrap();
        assert_eq!(plan.identifiers(), vec!["s1", "s2", "s3", "ch1", "ch2", "book"]);
        assert_eq!(plan.root().identifier, "book");
        assert_eq!(plan.root_position(), 5);
    }

    #[test]
    fn test_single_event_plan() {
        let plan = PublishPlan::from_records(vec![content("hello")], author(), 0).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.root().identifier, "hello");
    }

    #[test]
    fn test_dangling_reference() {
        let records = vec![index("book", &[(30041, "missing")])];
        let err = PublishPlan::from_records(records, author(), 0).unwrap_err();
        assert!(matches!(err, PlanError::DanglingReference { ref from, .. } if from == "book"));
    }

    #[test]
    fn test_foreign_author_is_dangling() {
        let mut book = index("book", &[]);
        book.variant = EventVariant::PublicationIndex {
            references: vec![Reference::new(30041, PublicKey::from_bytes([9; 32]), "s1")],
            content: String::new(),
        };
        let err = PublishPlan::from_records(vec![book, content("s1")], author(), 0).unwrap_err();
        assert!(matches!(err, PlanError::DanglingReference { .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let records = vec![
            index("a", &[(30040, "b")]),
            index("b", &[(30040, "a")]),
            content("c"),
        ];
        let err = PublishPlan::from_records(records, author(), 0).unwrap_err();
        assert_eq!(
            err,
            PlanError::Cycle {
                identifiers: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_duplicate_references_count_once() {
        let records = vec![index("book", &[(30041, "s1"), (30041, "s1")]), content("s1")];
        let plan = PublishPlan::from_records(records, author(), 0).unwrap();
        assert_eq!(plan.identifiers(), vec!["s1", "book"]);
    }
}
