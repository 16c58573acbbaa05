//! Event model
//!
//! [`EventRecord`] is what the compiler produces: a typed, unsigned event
//! whose body is one of a closed set of variants. [`UnsignedEvent`] and
//! [`SignedEvent`] are the wire shapes handed to relays.

use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::SigningError;
use crate::identity::{PublicKey, Signature, Signer};
use crate::kind::KindRole;

/// SHA-256 event id over the canonical serialization
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId([u8; 32]);

impl EventId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short display form for logs
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.short_id())
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid event id"))
    }
}

/// A single tag: a name followed by values, e.g. `["d", "chapter-1"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![name.into(), value.into()])
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn name(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// First value after the name
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Address of an addressable event: `(kind, author, identifier)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: u16,
    pub author: PublicKey,
    pub identifier: String,
}

impl Reference {
    pub fn new(kind: u16, author: PublicKey, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            author,
            identifier: identifier.into(),
        }
    }

    /// `<kind>:<pubkey-hex>:<identifier>`
    pub fn coordinate(&self) -> String {
        format!("{}:{}:{}", self.kind, self.author.to_hex(), self.identifier)
    }

    /// Parse a coordinate. The identifier may itself contain `:`.
    pub fn parse_coordinate(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next()?.parse().ok()?;
        let author = PublicKey::from_hex(parts.next()?).ok()?;
        let identifier = parts.next()?.to_string();
        Some(Self {
            kind,
            author,
            identifier,
        })
    }

    pub fn to_tag(&self) -> Tag {
        Tag::new("a", self.coordinate())
    }
}

/// Body of an event, one variant per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum EventVariant {
    LongForm { content: String },
    /// `content` is the index section's own text before its first sub-section
    PublicationIndex {
        references: Vec<Reference>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        content: String,
    },
    PublicationContent { content: String },
    Wiki { content: String },
}

impl EventVariant {
    /// Build the variant for `role` holding `content`
    ///
    /// Index roles start with an empty reference list.
    pub fn content_for(role: KindRole, content: String) -> Self {
        match role {
            KindRole::LongForm => EventVariant::LongForm { content },
            KindRole::PublicationContent => EventVariant::PublicationContent { content },
            KindRole::Wiki => EventVariant::Wiki { content },
            KindRole::PublicationIndex => EventVariant::PublicationIndex {
                references: Vec::new(),
                content,
            },
        }
    }

    pub fn role(&self) -> KindRole {
        match self {
            EventVariant::LongForm { .. } => KindRole::LongForm,
            EventVariant::PublicationIndex { .. } => KindRole::PublicationIndex,
            EventVariant::PublicationContent { .. } => KindRole::PublicationContent,
            EventVariant::Wiki { .. } => KindRole::Wiki,
        }
    }

    /// Prose body; for an index, its own text (often empty)
    pub fn content(&self) -> &str {
        match self {
            EventVariant::LongForm { content }
            | EventVariant::PublicationContent { content }
            | EventVariant::Wiki { content }
            | EventVariant::PublicationIndex { content, .. } => content,
        }
    }

    pub fn references(&self) -> &[Reference] {
        match self {
            EventVariant::PublicationIndex { references, .. } => references,
            _ => &[],
        }
    }
}

/// A compiled, unsigned event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wire kind number
    pub kind: u16,
    /// The `d` tag; unique per author and kind
    pub identifier: String,
    pub title: String,
    pub variant: EventVariant,
    /// Extra tags beyond `d`, `title` and references
    pub tags: Vec<Tag>,
    /// Unix seconds
    pub created_at: u64,
}

impl EventRecord {
    pub fn is_index(&self) -> bool {
        self.variant.role().is_index()
    }

    pub fn content(&self) -> &str {
        self.variant.content()
    }

    pub fn references(&self) -> &[Reference] {
        self.variant.references()
    }

    /// Address of this event when published by `author`
    pub fn address(&self, author: PublicKey) -> Reference {
        Reference::new(self.kind, author, self.identifier.clone())
    }

    /// Full tag list in wire order: `d`, `title`, extras, then one `a` per reference
    pub fn wire_tags(&self) -> Vec<Tag> {
        let mut tags = Vec::with_capacity(2 + self.tags.len() + self.references().len());
        tags.push(Tag::new("d", self.identifier.clone()));
        tags.push(Tag::new("title", self.title.clone()));
        tags.extend(self.tags.iter().cloned());
        tags.extend(self.references().iter().map(Reference::to_tag));
        tags
    }

    pub fn to_unsigned(&self, author: PublicKey) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: author,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.wire_tags(),
            content: self.content().to_string(),
        }
    }
}

/// Event in wire shape, ready to be hashed and signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub pubkey: PublicKey,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl UnsignedEvent {
    /// SHA-256 over `[0, pubkey, created_at, kind, tags, content]`
    pub fn id(&self) -> EventId {
        compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)
    }

    pub fn sign(self, signer: &Signer) -> Result<SignedEvent, SigningError> {
        if signer.public_key() != self.pubkey {
            return Err(SigningError::SigningFailed(
                "event author does not match signer".to_string(),
            ));
        }
        let id = self.id();
        let sig = signer.sign(id.as_bytes())?;
        Ok(SignedEvent {
            id,
            pubkey: self.pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        })
    }
}

fn compute_id(pubkey: &PublicKey, created_at: u64, kind: u16, tags: &[Tag], content: &str) -> EventId {
    let canonical = serde_json::json!([0, pubkey.to_hex(), created_at, kind, tags, content]);
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    EventId::from_bytes(digest.into())
}

/// A signed event as stored and echoed by relays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: EventId,
    pub pubkey: PublicKey,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: Signature,
}

impl SignedEvent {
    /// First value of the first tag with this name
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name() == name)
            .and_then(Tag::value)
    }

    /// The `d` tag
    pub fn identifier(&self) -> Option<&str> {
        self.tag_value("d")
    }

    pub fn title(&self) -> Option<&str> {
        self.tag_value("title")
    }

    /// References parsed from `a` tags, in tag order
    pub fn references(&self) -> Vec<Reference> {
        self.tags
            .iter()
            .filter(|t| t.name() == "a")
            .filter_map(|t| t.value().and_then(Reference::parse_coordinate))
            .collect()
    }

    pub fn address(&self) -> Option<Reference> {
        self.identifier()
            .map(|d| Reference::new(self.kind, self.pubkey, d))
    }

    /// Whether `id` matches the content. Signature checking is the
    /// signing collaborator's concern.
    pub fn verify_id(&self) -> bool {
        compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content) == self.id
    }

    /// Addressable kinds are replaced by newer versions with the same
    /// `(kind, author, d)`
    pub fn is_addressable(&self) -> bool {
        (30000..40000).contains(&self.kind)
    }
}
