//! Event graph
//!
//! Maps the section tree onto events. Shallow sections with children become
//! index events that reference their children, one reference per child in
//! order, and carry their own text before the first sub-section. Everything
//! at or below the content level (and every leaf) becomes a content event
//! holding its whole subtree as text.

use quire_core::{EventRecord, EventVariant, KindRole, PublicKey, Reference, Tag};
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::header::Metadata;
use crate::identifier::{IdentifierAllocator, IdentifierPolicy};
use crate::tree::{Document, SectionNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Index,
    Content,
}

/// Resolved parameters for one graph build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    pub content_level: u8,
    pub content_kind: u16,
    pub content_role: KindRole,
    pub index_kind: u16,
    pub policy: IdentifierPolicy,
}

/// One event in the graph, with its place in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub role: NodeRole,
    /// Header level of the section this event came from
    pub level: u8,
    pub record: EventRecord,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl GraphNode {
    pub fn identifier(&self) -> &str {
        &self.record.identifier
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }

    pub fn kind(&self) -> u16 {
        self.record.kind
    }

    pub fn is_content(&self) -> bool {
        self.role == NodeRole::Content
    }
}

/// Events of one document in pre-order; the root is always node 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGraph {
    author: PublicKey,
    created_at: u64,
    nodes: Vec<GraphNode>,
}

impl EventGraph {
    pub fn build(document: &Document, settings: &GraphSettings, author: PublicKey) -> Self {
        let mut builder = GraphBuilder {
            settings,
            author,
            metadata: &document.metadata,
            dialect: document.dialect,
            allocator: IdentifierAllocator::new(),
            nodes: Vec::with_capacity(document.root.node_count()),
        };
        builder.visit(&document.root, None);
        Self {
            author,
            created_at: settings.policy.created_at,
            nodes: builder.nodes,
        }
    }

    pub fn author(&self) -> PublicKey {
        self.author
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn root(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.identifier() == identifier)
    }

    pub fn content_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_content())
    }

    pub fn index_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| !n.is_content())
    }

    /// Event records in pre-order
    pub fn records(&self) -> Vec<EventRecord> {
        self.nodes.iter().map(|n| n.record.clone()).collect()
    }
}

struct GraphBuilder<'a> {
    settings: &'a GraphSettings,
    author: PublicKey,
    metadata: &'a Metadata,
    dialect: Dialect,
    allocator: IdentifierAllocator,
    nodes: Vec<GraphNode>,
}

impl GraphBuilder<'_> {
    fn role_of(&self, section: &SectionNode, is_root: bool) -> NodeRole {
        if section.is_leaf() {
            NodeRole::Content
        } else if !is_root && section.level >= self.settings.content_level {
            NodeRole::Content
        } else {
            NodeRole::Index
        }
    }

    fn visit(&mut self, section: &SectionNode, parent: Option<usize>) -> usize {
        let is_root = parent.is_none();
        match self.role_of(section, is_root) {
            NodeRole::Content => {
                let body = section.render_body(self.dialect);
                self.push_content(&section.title, section.level, body, parent)
            }
            NodeRole::Index => self.push_index(section, parent),
        }
    }

    fn push_content(
        &mut self,
        title: &str,
        level: u8,
        body: String,
        parent: Option<usize>,
    ) -> usize {
        let settings = self.settings;
        let static_slug = settings.content_role.uses_static_identifier();
        let candidate = match parent {
            None => settings.policy.root(title, static_slug),
            Some(_) => settings.policy.section(title, static_slug),
        };
        let identifier = self.allocator.allocate(settings.content_kind, candidate);

        let tags = if parent.is_none() {
            root_tags(self.metadata)
        } else {
            author_tag(self.metadata).into_iter().collect()
        };
        let record = EventRecord {
            kind: settings.content_kind,
            identifier,
            title: title.to_string(),
            variant: EventVariant::content_for(settings.content_role, body),
            tags,
            created_at: settings.policy.created_at,
        };
        self.push(NodeRole::Content, level, record, parent)
    }

    fn push_index(&mut self, section: &SectionNode, parent: Option<usize>) -> usize {
        let settings = self.settings;
        let candidate = match parent {
            None => settings.policy.root(&section.title, false),
            Some(_) => settings.policy.section(&section.title, false),
        };
        let identifier = self.allocator.allocate(settings.index_kind, candidate);
        let record = EventRecord {
            kind: settings.index_kind,
            identifier,
            title: section.title.clone(),
            variant: EventVariant::content_for(KindRole::PublicationIndex, section.content.clone()),
            tags: if parent.is_none() {
                root_tags(self.metadata)
            } else {
                Vec::new()
            },
            created_at: settings.policy.created_at,
        };
        let idx = self.push(NodeRole::Index, section.level, record, parent);

        for child in &section.children {
            self.visit(child, Some(idx));
        }

        let references: Vec<Reference> = self.nodes[idx]
            .children
            .iter()
            .map(|&c| self.nodes[c].record.address(self.author))
            .collect();
        if let EventVariant::PublicationIndex { references: slot, .. } =
            &mut self.nodes[idx].record.variant
        {
            *slot = references;
        }
        idx
    }

    fn push(
        &mut self,
        role: NodeRole,
        level: u8,
        record: EventRecord,
        parent: Option<usize>,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(GraphNode {
            role,
            level,
            record,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(idx);
        }
        idx
    }
}

fn author_tag(metadata: &Metadata) -> Option<Tag> {
    metadata.author().map(|a| Tag::new("author", a))
}

/// Publication-level tags carried by the root event
fn root_tags(metadata: &Metadata) -> Vec<Tag> {
    const SIMPLE: &[(&str, &str)] = &[
        ("author", "author"),
        ("summary", "summary"),
        ("image", "image"),
        ("published-on", "published_on"),
        ("published-by", "published_by"),
        ("version", "version"),
        ("source", "source"),
        ("language", "l"),
        ("type", "type"),
    ];
    let mut tags: Vec<Tag> = SIMPLE
        .iter()
        .filter_map(|(key, name)| metadata.get(key).map(|v| Tag::new(*name, v)))
        .collect();
    tags.extend(metadata.tags().into_iter().map(|t| Tag::new("t", t)));
    tags
}
