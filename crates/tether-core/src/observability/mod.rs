//! Structured logging: `tracing` with `EnvFilter`, plain or JSON output.

pub mod events;
pub mod setup;

pub use setup::init_tracing;

/// Span names as constants for programmatic use.
pub mod names {
    pub const SYNC_CYCLE: &str = "tether.sync_cycle";
    pub const DRAIN: &str = "tether.drain";
    pub const PULL: &str = "tether.pull";
    pub const CACHE_CLEANUP: &str = "tether.cache_cleanup";
}
