//! # tether-core
//!
//! Foundation crate for the Tether offline-first sync engine.
//! Defines the data model, errors, config, injected capabilities, the
//! ISO-8601 time boundary, and tracing setup.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod observability;
pub mod time;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::TetherConfig;
pub use errors::{TetherError, TetherResult};
pub use models::{CachedRecord, ConflictCase, OperationKind, Payload, PendingOperation};
