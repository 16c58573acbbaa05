//! Event kinds and the kind-number registry
//!
//! Every event Quire produces plays one of a closed set of structural
//! roles ([`KindRole`]). The numeric kind written on the wire is looked up
//! through a [`KindRegistry`], so deployments can remap numbers without
//! touching the compiler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Long-form article
pub const KIND_LONG_FORM: u16 = 30023;
/// Publication index (ordered references to other events)
pub const KIND_PUBLICATION_INDEX: u16 = 30040;
/// Publication content section
pub const KIND_PUBLICATION_CONTENT: u16 = 30041;
/// Wiki article
pub const KIND_WIKI: u16 = 30818;

/// Structural role of an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindRole {
    LongForm,
    PublicationIndex,
    PublicationContent,
    Wiki,
}

impl KindRole {
    /// Whether this role orders references instead of holding prose
    pub fn is_index(self) -> bool {
        matches!(self, KindRole::PublicationIndex)
    }

    /// Whether identifiers for this role are normalized rather than
    /// timestamped (shared, collaboratively edited articles)
    pub fn uses_static_identifier(self) -> bool {
        matches!(self, KindRole::Wiki)
    }

    /// The conventional kind number for this role
    pub fn default_kind(self) -> u16 {
        match self {
            KindRole::LongForm => KIND_LONG_FORM,
            KindRole::PublicationIndex => KIND_PUBLICATION_INDEX,
            KindRole::PublicationContent => KIND_PUBLICATION_CONTENT,
            KindRole::Wiki => KIND_WIKI,
        }
    }
}

impl std::fmt::Display for KindRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindRole::LongForm => write!(f, "long-form"),
            KindRole::PublicationIndex => write!(f, "publication-index"),
            KindRole::PublicationContent => write!(f, "publication-content"),
            KindRole::Wiki => write!(f, "wiki"),
        }
    }
}

/// One registry entry in serialized form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindEntry {
    pub kind: u16,
    pub role: KindRole,
}

/// Maps kind numbers to roles
///
/// Serialized as a list of `{ kind, role }` entries so it round-trips
/// through TOML, which only allows string table keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<KindEntry>", into = "Vec<KindEntry>")]
pub struct KindRegistry {
    kinds: BTreeMap<u16, KindRole>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::empty()
            .with(KIND_LONG_FORM, KindRole::LongForm)
            .with(KIND_PUBLICATION_INDEX, KindRole::PublicationIndex)
            .with(KIND_PUBLICATION_CONTENT, KindRole::PublicationContent)
            .with(KIND_WIKI, KindRole::Wiki)
    }
}

impl KindRegistry {
    /// A registry with no kinds
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Register a kind number, replacing any previous role for it
    pub fn with(mut self, kind: u16, role: KindRole) -> Self {
        self.kinds.insert(kind, role);
        self
    }

    pub fn role_of(&self, kind: u16) -> Option<KindRole> {
        self.kinds.get(&kind).copied()
    }

    /// Resolve a kind number, failing for numbers nobody registered
    pub fn resolve(&self, kind: u16) -> Result<KindRole, ParseError> {
        self.role_of(kind).ok_or(ParseError::UnknownKind(kind))
    }

    /// Kind number for a role. Prefers the conventional number when it is
    /// registered, otherwise the lowest number mapped to the role.
    pub fn kind_for(&self, role: KindRole) -> Option<u16> {
        if self.role_of(role.default_kind()) == Some(role) {
            return Some(role.default_kind());
        }
        self.kinds
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(kind, _)| *kind)
    }

    pub fn contains(&self, kind: u16) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// All registered kind numbers, ascending
    pub fn kinds(&self) -> Vec<u16> {
        self.kinds.keys().copied().collect()
    }
}

impl From<Vec<KindEntry>> for KindRegistry {
    fn from(entries: Vec<KindEntry>) -> Self {
        entries
            .into_iter()
            .fold(Self::empty(), |reg, entry| reg.with(entry.kind, entry.role))
    }
}

impl From<KindRegistry> for Vec<KindEntry> {
    fn from(registry: KindRegistry) -> Self {
        registry
            .kinds
            .into_iter()
            .map(|(kind, role)| KindEntry { kind, role })
            .collect()
    }
}
