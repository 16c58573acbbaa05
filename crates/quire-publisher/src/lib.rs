//! # Quire Publisher
//!
//! Runs a whole publication: compile the document, sign the planned
//! events, pick live relays, disseminate in plan order and report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use quire_compiler::CompileOptions;
//! use quire_core::SystemClock;
//! use quire_publisher::{Publisher, PublisherConfig};
//!
//! let config = PublisherConfig::from_file("quire.toml")?;
//! let publisher = Publisher::new(config, client, signer, Arc::new(SystemClock))?;
//!
//! let report = publisher
//!     .publish_document(&text, &CompileOptions::new().with_relays("wiki"))
//!     .await?;
//! println!("{}", report.to_json()?);
//! ```
//!
//! A report is returned whenever publishing started, even if the root
//! event missed quorum or the run timed out; [`PublishReport::success`]
//! says whether the publication is durable.

pub mod config;
pub mod error;
pub mod fetch;
pub mod publisher;
pub mod report;

pub use config::{DEFAULT_QUORUM, PublisherConfig};
pub use error::{PublisherError, PublisherResult};
pub use fetch::Publication;
pub use publisher::Publisher;
pub use report::{PlannedEvent, PublishReport, ReportError};
