//! Title and metadata block extraction

use std::collections::BTreeMap;

use quire_core::ParseError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::Dialect;

/// Metadata keys with a defined meaning. Other keys are kept but unused.
pub const KNOWN_KEYS: &[&str] = &[
    "author",
    "summary",
    "image",
    "published-on",
    "published-by",
    "version",
    "source",
    "language",
    "type",
    "tags",
    "relays",
    "kind",
    "content-level",
    "auto-update",
    "reuse-identifier",
    "identifier",
];

/// The `key: value` block that follows a document title
///
/// Keys are stored normalized: trimmed, lowercased, `_` replaced by `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase().replace('_', "-")
    }

    /// Parse one metadata line, `key: value` or `:key: value`
    pub fn parse_line(line: &str) -> Option<(String, String)> {
        let body = line.strip_prefix(':').unwrap_or(line);
        let (key, value) = body.split_once(':')?;
        let key = Self::normalize_key(key);
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        Some((key, value.trim().to_string()))
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = Self::normalize_key(key);
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!(key = %key, "Unrecognised metadata key");
        }
        self.entries.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&Self::normalize_key(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn author(&self) -> Option<&str> {
        self.get("author")
    }

    /// `tags`, split on commas
    pub fn tags(&self) -> Vec<String> {
        self.get("tags")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn relays(&self) -> Option<&str> {
        self.get("relays")
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get("identifier")
    }

    pub fn reuse_identifier(&self) -> Option<&str> {
        self.get("reuse-identifier")
    }

    pub fn content_level(&self) -> Result<Option<u8>, ParseError> {
        self.parse_number("content-level")
    }

    pub fn kind(&self) -> Result<Option<u16>, ParseError> {
        self.parse_number("kind")
    }

    pub fn auto_update(&self) -> Result<Option<bool>, ParseError> {
        let Some(raw) = self.get("auto-update") else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(ParseError::InvalidMetadata {
                key: "auto-update".to_string(),
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        }
    }

    fn parse_number<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ParseError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|_| ParseError::InvalidMetadata {
            key: key.to_string(),
            reason: format!("expected a number, got '{raw}'"),
        })
    }
}

/// Title line, metadata block and the remaining body lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<'a> {
    pub dialect: Dialect,
    pub title: String,
    pub metadata: Metadata,
    /// 1-based line number of the first body line
    pub body_start: usize,
    pub body: Vec<&'a str>,
}

impl<'a> Header<'a> {
    /// Split a document into its header and body
    ///
    /// The first non-blank line must be a level-1 header. When `dialect`
    /// is `None` it is detected from that line.
    pub fn extract(text: &'a str, dialect: Option<Dialect>) -> Result<Self, ParseError> {
        let lines: Vec<&str> = text.lines().collect();
        let first = lines
            .iter()
            .position(|l| !l.trim().is_empty())
            .ok_or(ParseError::MissingTitle)?;

        let dialect = dialect
            .or_else(|| Dialect::detect(lines[first]))
            .ok_or(ParseError::MissingTitle)?;
        let header = dialect
            .parse_header(lines[first].trim_start())
            .filter(|h| h.level == 1)
            .ok_or(ParseError::MissingTitle)?;
        if header.title.is_empty() {
            return Err(ParseError::EmptyTitle);
        }

        let mut metadata = Metadata::new();
        let mut cursor = first + 1;
        while let Some(line) = lines.get(cursor) {
            if line.trim().is_empty() || dialect.parse_header(line).is_some() {
                break;
            }
            match Metadata::parse_line(line) {
                Some((key, value)) => metadata.insert(&key, value),
                None => break,
            }
            cursor += 1;
        }

        Ok(Self {
            dialect,
            title: header.title.to_string(),
            metadata,
            body_start: cursor + 1,
            body: lines[cursor..].to_vec(),
        })
    }
}
