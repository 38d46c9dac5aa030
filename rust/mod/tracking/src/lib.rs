//! Zone-occupancy tracking engine.
//!
//! Tracks physical units through a fixed sequence of numbered production
//! zones: who moved them, when, and how long each stage took. The unit
//! ledger is the source of truth; per-zone cache records exist only to
//! make "what's in zone N right now" cheap and are repaired from the
//! ledger by the consistency sweep whenever they drift.

pub mod config;
pub mod model;
pub mod resolver;
pub mod service;

pub use config::TrackingConfig;
pub use resolver::{IdentityResolver, NameResolver, StaticResolver};
pub use service::TrackingService;
