//! # Quire Relay
//!
//! Getting events onto unreliable relays.
//!
//! - [`RelaySelector`]: resolves a [`RelaySpec`] into concrete relays and
//!   keeps the ones that answer a liveness probe
//! - [`Disseminator`]: publishes an event to many relays concurrently with
//!   per-relay retry, then checks the result against a quorum; also runs
//!   deduplicating queries
//!
//! Both work over any [`RelayClient`](quire_core::RelayClient), so tests run
//! against [`MockRelayNetwork`](quire_core::MockRelayNetwork).

pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod selector;

pub use config::{
    ALL_CATEGORIES, DEFAULT_FALLBACK_RELAY, DisseminationConfig, RelayCategories, SelectorConfig,
};
pub use delivery::{RelayDeliveryState, backoff_for};
pub use engine::{Disseminator, QueryResult};
pub use error::{RelayError, RelayResult};
pub use selector::{DEFAULT_CATEGORY, Liveness, RelayEndpoint, RelaySelector, RelaySpec};
