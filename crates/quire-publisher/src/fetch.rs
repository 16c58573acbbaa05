//! Reading a publication back from relays
//!
//! An index references its sections by address, not by id, and relays may
//! hold several versions of each address. Fetching resolves every address
//! to its newest version and walks nested indexes in document order.

use std::collections::{HashMap, HashSet};

use quire_core::{Filter, Reference, SignedEvent};
use serde::{Deserialize, Serialize};

/// An index event together with everything it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub index: SignedEvent,
    /// Referenced events in document order, nested indexes included
    pub sections: Vec<SignedEvent>,
    /// References no relay could resolve
    pub missing: Vec<Reference>,
}

impl Publication {
    /// Walk the references depth-first from `index`, in reference order
    ///
    /// Each address is visited once, so reference cycles terminate.
    pub fn assemble(index: SignedEvent, resolved: &HashMap<Reference, SignedEvent>) -> Self {
        let mut sections = Vec::new();
        let mut missing = Vec::new();
        let mut visited: HashSet<Reference> = index.address().into_iter().collect();
        let mut stack: Vec<Reference> = index.references().into_iter().rev().collect();

        while let Some(reference) = stack.pop() {
            if !visited.insert(reference.clone()) {
                continue;
            }
            match resolved.get(&reference) {
                Some(event) => {
                    stack.extend(event.references().into_iter().rev());
                    sections.push(event.clone());
                }
                None => missing.push(reference),
            }
        }

        Self {
            index,
            sections,
            missing,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Section identifiers in document order
    pub fn identifiers(&self) -> Vec<&str> {
        self.sections.iter().filter_map(SignedEvent::identifier).collect()
    }
}

/// Whether `candidate` supersedes `current` for the same address
///
/// Newer `created_at` wins; on a tie the lower id wins.
pub fn supersedes(candidate: &SignedEvent, current: &SignedEvent) -> bool {
    candidate.created_at > current.created_at
        || (candidate.created_at == current.created_at && candidate.id < current.id)
}

/// Newest version among `events`
pub fn newest<'a>(events: impl IntoIterator<Item = &'a SignedEvent>) -> Option<&'a SignedEvent> {
    events.into_iter().fold(None, |best, event| match best {
        Some(current) if !supersedes(event, current) => Some(current),
        _ => Some(event),
    })
}

/// Record `event` under its address unless a newer version is already held
pub fn keep_newest(resolved: &mut HashMap<Reference, SignedEvent>, event: SignedEvent) {
    let Some(address) = event.address() else {
        return;
    };
    match resolved.get(&address) {
        Some(current) if !supersedes(&event, current) => {}
        _ => {
            resolved.insert(address, event);
        }
    }
}

/// One filter per referenced kind, in first-appearance order
pub fn reference_filters(references: &[Reference]) -> Vec<Filter> {
    let mut filters: Vec<Filter> = Vec::new();
    for reference in references {
        let position = match filters.iter().position(|f| f.kinds == [reference.kind]) {
            Some(position) => position,
            None => {
                filters.push(Filter::new().kind(reference.kind));
                filters.len() - 1
            }
        };
        let filter = &mut filters[position];
        if !filter.authors.contains(&reference.author) {
            filter.authors.push(reference.author);
        }
        if !filter.identifiers.contains(&reference.identifier) {
            filter.identifiers.push(reference.identifier.clone());
        }
    }
    filters
}
