//! Section tree
//!
//! A document body becomes a tree of [`SectionNode`]s. Each header opens a
//! node; the lines before the node's first sub-header are its own content.
//! The tree is immutable once built. Roles and identifiers are computed
//! later, on the event graph.

use quire_core::ParseError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dialect::Dialect;
use crate::header::{Header, Metadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub level: u8,
    pub title: String,
    /// Text before the first sub-header, blank edges trimmed
    pub content: String,
    pub children: Vec<SectionNode>,
}

impl SectionNode {
    fn new(level: u8, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            content: String::new(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, self included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SectionNode::node_count).sum::<usize>()
    }

    /// Own content followed by every descendant rendered back as markup
    pub fn render_body(&self, dialect: Dialect) -> String {
        let mut blocks = Vec::new();
        if !self.content.is_empty() {
            blocks.push(self.content.clone());
        }
        for child in &self.children {
            child.render_into(dialect, &mut blocks);
        }
        blocks.join("\n\n")
    }

    fn render_into(&self, dialect: Dialect, blocks: &mut Vec<String>) {
        let header = dialect.render_header(self.level, &self.title);
        if self.content.is_empty() {
            blocks.push(header);
        } else {
            blocks.push(format!("{header}\n\n{}", self.content));
        }
        for child in &self.children {
            child.render_into(dialect, blocks);
        }
    }
}

/// Non-fatal structural issue found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A header jumped more than one level below its parent
    SkippedLevel {
        line: usize,
        title: String,
        parent_level: u8,
        level: u8,
    },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::SkippedLevel {
                line,
                title,
                parent_level,
                level,
            } => write!(
                f,
                "line {line}: '{title}' is level {level} under a level-{parent_level} parent"
            ),
        }
    }
}

/// A parsed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub metadata: Metadata,
    pub dialect: Dialect,
    /// Level-1 node holding the preamble and every section
    pub root: SectionNode,
    pub warnings: Vec<ParseWarning>,
}

impl Document {
    pub fn parse(text: &str, dialect: Option<Dialect>) -> Result<Self, ParseError> {
        let header = Header::extract(text, dialect)?;
        let mut builder = TreeBuilder::new(&header.title);

        let mut fence: Option<String> = None;
        for (offset, line) in header.body.iter().enumerate() {
            let line_no = header.body_start + offset;

            if let Some(open) = &fence {
                if header.dialect.closes_block(open, line) {
                    fence = None;
                }
                builder.push_line(line);
                continue;
            }
            if let Some(delimiter) = header.dialect.block_delimiter(line) {
                fence = Some(delimiter);
                builder.push_line(line);
                continue;
            }

            match header.dialect.parse_header(line) {
                Some(h) if h.level == 1 => return Err(ParseError::MultipleTitles { line: line_no }),
                Some(h) => builder.open(h.level, h.title, line_no),
                None => builder.push_line(line),
            }
        }

        let (root, warnings) = builder.finish();
        Ok(Self {
            title: header.title,
            metadata: header.metadata,
            dialect: header.dialect,
            root,
            warnings,
        })
    }

    /// Whether the body has no sub-headers at all
    pub fn is_simple(&self) -> bool {
        self.root.is_leaf()
    }
}

/// Stack of open nodes, innermost last
struct TreeBuilder {
    stack: Vec<(SectionNode, Vec<String>)>,
    warnings: Vec<ParseWarning>,
}

impl TreeBuilder {
    fn new(title: &str) -> Self {
        Self {
            stack: vec![(SectionNode::new(1, title), Vec::new())],
            warnings: Vec::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        if let Some((_, lines)) = self.stack.last_mut() {
            lines.push(line.to_string());
        }
    }

    fn open(&mut self, level: u8, title: &str, line: usize) {
        // The root is level 1 and headers here are 2..=6, so the root never pops
        while self.stack.last().is_some_and(|(node, _)| node.level >= level) {
            self.close_top();
        }
        let parent_level = self.stack.last().map(|(node, _)| node.level).unwrap_or(1);
        if level > parent_level + 1 {
            warn!(line, title, parent_level, level, "Header skips a level");
            self.warnings.push(ParseWarning::SkippedLevel {
                line,
                title: title.to_string(),
                parent_level,
                level,
            });
        }
        self.stack.push((SectionNode::new(level, title), Vec::new()));
    }

    fn close_top(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        if let Some((mut node, lines)) = self.stack.pop() {
            node.content = trim_blank_edges(&lines);
            if let Some((parent, _)) = self.stack.last_mut() {
                parent.children.push(node);
            }
        }
    }

    fn finish(mut self) -> (SectionNode, Vec<ParseWarning>) {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let (mut root, lines) = self
            .stack
            .pop()
            .unwrap_or_else(|| (SectionNode::new(1, ""), Vec::new()));
        root.content = trim_blank_edges(&lines);
        (root, self.warnings)
    }
}

fn trim_blank_edges(lines: &[String]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}
