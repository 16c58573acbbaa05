//! Identifier assignment
//!
//! Every event carries a `d` identifier, unique per author and kind.
//! Identifiers are derived from titles; whether they carry a timestamp
//! decides if a republish replaces the previous version or appends a new one.

use std::collections::HashMap;

/// Used when a title has no slug-able characters
pub const FALLBACK_SLUG: &str = "section";

/// Lowercase, hyphen-separated, `[a-z0-9-]` only
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if (c == '-' || c.is_whitespace()) && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// How identifiers are derived for one compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierPolicy {
    /// Identifier of a previous publication to replace
    pub reuse_identifier: Option<String>,
    /// Static root identifier, used verbatim
    pub static_identifier: Option<String>,
    /// When false, identifiers get a `-<created_at>` suffix
    pub auto_update: bool,
    pub created_at: u64,
}

impl IdentifierPolicy {
    /// Whether identifiers are timestamped so a republish appends
    pub fn appends(&self) -> bool {
        !self.auto_update && self.reuse_identifier.is_none()
    }

    pub fn root(&self, title: &str, static_slug: bool) -> String {
        if let Some(reuse) = &self.reuse_identifier {
            return reuse.clone();
        }
        if let Some(fixed) = &self.static_identifier {
            return fixed.clone();
        }
        self.derive(title, static_slug)
    }

    /// Identifier for a non-root node. `static_slug` roles (wiki) never get
    /// a timestamp.
    pub fn section(&self, title: &str, static_slug: bool) -> String {
        self.derive(title, static_slug)
    }

    fn derive(&self, title: &str, static_slug: bool) -> String {
        let slug = slugify(title);
        if static_slug || !self.appends() {
            slug
        } else {
            format!("{slug}-{}", self.created_at)
        }
    }
}

/// Hands out identifiers unique per kind, suffixing repeats with `-2`, `-3`, ...
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    taken: HashMap<u16, HashMap<String, u32>>,
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: u16, candidate: String) -> String {
        let seen = self.taken.entry(kind).or_default();
        if !seen.contains_key(&candidate) {
            seen.insert(candidate.clone(), 1);
            return candidate;
        }
        let mut n = seen.get(&candidate).copied().unwrap_or(1);
        loop {
            n += 1;
            let next = format!("{candidate}-{n}");
            if !seen.contains_key(&next) {
                seen.insert(candidate, n);
                seen.insert(next.clone(), 1);
                return next;
            }
        }
    }
}
