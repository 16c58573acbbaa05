//! # Quire Compiler
//!
//! Turns a structured document into an ordered plan of addressable events.
//!
//! Compilation runs in four pure stages:
//!
//! 1. [`Header`] extraction: title and `key: value` metadata
//! 2. [`Document`] parsing: the section tree
//! 3. [`EventGraph`] building: roles, kinds, identifiers, references and tags
//! 4. [`PublishPlan`] linearization: referenced events before their indexes
//!
//! No stage touches the network. The only outside input is the clock,
//! read once per compile.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_compiler::{CompileDefaults, CompileOptions, Compiler};
//! use quire_core::{FixedClock, PublicKey};
//!
//! let compiler = Compiler::new(CompileDefaults::default());
//! let options = CompileOptions::new().with_content_level(3);
//! let compilation = compiler.compile(text, &options, author, &FixedClock::at(1_700_000_000))?;
//! for event in compilation.plan.events() {
//!     println!("{} {}", event.kind, event.identifier);
//! }
//! ```

pub mod dialect;
pub mod graph;
pub mod header;
pub mod identifier;
pub mod options;
pub mod plan;
pub mod tree;

pub use dialect::Dialect;
pub use graph::{EventGraph, GraphNode, GraphSettings, NodeRole};
pub use header::{Header, Metadata};
pub use identifier::{IdentifierAllocator, IdentifierPolicy, slugify};
pub use options::{CompileDefaults, CompileOptions, DEFAULT_CONTENT_LEVEL};
pub use plan::PublishPlan;
pub use tree::{Document, ParseWarning, SectionNode};

use quire_core::{Clock, ParseError, PublicKey, QuireResult};
use tracing::{debug, info, instrument};

use crate::dialect::MAX_LEVEL;

/// Result of compiling one document
#[derive(Debug, Clone)]
pub struct Compilation {
    pub document: Document,
    pub graph: EventGraph,
    pub plan: PublishPlan,
}

/// Document compiler
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    defaults: CompileDefaults,
}

impl Compiler {
    pub fn new(defaults: CompileDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &CompileDefaults {
        &self.defaults
    }

    pub fn parse(&self, text: &str, options: &CompileOptions) -> Result<Document, ParseError> {
        Document::parse(text, options.dialect)
    }

    /// Compile a document into its event graph and publish plan
    #[instrument(skip_all, fields(author = %author.short_id()))]
    pub fn compile(
        &self,
        text: &str,
        options: &CompileOptions,
        author: PublicKey,
        clock: &dyn Clock,
    ) -> QuireResult<Compilation> {
        let document = self.parse(text, options)?;
        let settings = self.resolve(&document, options, clock.unix_seconds())?;
        debug!(
            content_level = settings.content_level,
            content_kind = settings.content_kind,
            appends = settings.policy.appends(),
            "Resolved compile settings"
        );

        let graph = EventGraph::build(&document, &settings, author);
        let plan = PublishPlan::from_graph(&graph)?;
        info!(
            title = %document.title,
            events = plan.len(),
            root = %plan.root().identifier,
            warnings = document.warnings.len(),
            "Compiled document"
        );

        Ok(Compilation {
            document,
            graph,
            plan,
        })
    }

    /// Merge options, metadata and defaults. Options win over metadata,
    /// metadata over defaults.
    pub fn resolve(
        &self,
        document: &Document,
        options: &CompileOptions,
        created_at: u64,
    ) -> Result<GraphSettings, ParseError> {
        let metadata = &document.metadata;

        let content_level = match options.content_level {
            Some(level) => level,
            None => metadata
                .content_level()?
                .unwrap_or(self.defaults.content_level),
        };
        if !(1..=MAX_LEVEL).contains(&content_level) {
            return Err(ParseError::InvalidContentLevel(content_level));
        }

        let simple = document.is_simple();
        let content_kind = match options.content_kind {
            Some(kind) => Some(kind),
            None => metadata.kind()?.or_else(|| self.defaults.content_kind(simple)),
        }
        .ok_or_else(|| ParseError::UnknownKind(default_kind(simple)))?;
        let content_role = self.defaults.kinds.resolve(content_kind)?;
        if content_role.is_index() {
            return Err(ParseError::InvalidMetadata {
                key: "kind".to_string(),
                reason: format!("kind {content_kind} is an index kind and cannot hold content"),
            });
        }
        let index_kind = self
            .defaults
            .index_kind()
            .ok_or(ParseError::UnknownKind(quire_core::KIND_PUBLICATION_INDEX))?;

        let auto_update = match options.auto_update {
            Some(auto_update) => auto_update,
            None => metadata
                .auto_update()?
                .unwrap_or(self.defaults.auto_update),
        };

        Ok(GraphSettings {
            content_level,
            content_kind,
            content_role,
            index_kind,
            policy: IdentifierPolicy {
                reuse_identifier: options
                    .reuse_identifier
                    .clone()
                    .or_else(|| metadata.reuse_identifier().map(str::to_string)),
                static_identifier: options
                    .identifier
                    .clone()
                    .or_else(|| metadata.identifier().map(str::to_string)),
                auto_update,
                created_at,
            },
        })
    }
}

fn default_kind(simple: bool) -> u16 {
    if simple {
        quire_core::KIND_LONG_FORM
    } else {
        quire_core::KIND_PUBLICATION_CONTENT
    }
}
