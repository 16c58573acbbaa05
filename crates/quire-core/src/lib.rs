//! # Quire Core
//!
//! Core types, seams and errors shared by the Quire publishing stack.
//!
//! The compiler turns documents into [`EventRecord`]s; the relay layer
//! signs and disseminates them as [`SignedEvent`]s. Everything both sides
//! agree on lives here.
//!
//! ## Key Traits
//!
//! - [`RelayClient`]: Primitive connect/publish/query/disconnect against a relay
//! - [`SigningOracle`]: External signer; Quire never touches primitives
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`EventRecord`]: Compiled, unsigned event with a typed [`EventVariant`] body
//! - [`KindRegistry`]: Kind number to [`KindRole`] mapping
//! - [`Filter`]: Relay query filter
//! - [`EventOutcome`]: Per-event, per-relay publish results and [`Disposition`]
//! - [`MockRelayNetwork`]: In-memory relays for tests

pub mod duration_serde;
pub mod error;
pub mod event;
pub mod filter;
pub mod identity;
pub mod kind;
pub mod mock_transport;
pub mod outcome;
pub mod traits;
pub mod transport;

// Re-export main types
pub use error::*;
pub use event::*;
pub use filter::*;
pub use identity::{PublicKey, SecretKey, Signature, Signer, SigningOracle};
pub use kind::*;
pub use mock_transport::*;
pub use outcome::*;
pub use traits::*;
pub use transport::*;
