//! # tether-sync
//!
//! Offline-first synchronization: the [`SyncEngine`] facade, the sync
//! coordinator, conflict detection and resolution, the device registry,
//! the HTTP transport, and the auto-sync scheduler.

pub mod conflict;
pub mod device;
pub mod engine;
pub mod scheduler;
pub mod sync;
pub mod transport;
pub mod typed;

pub use conflict::{FieldChoice, MergeResolution, Resolution, ResolutionEffect};
pub use engine::{EngineDeps, SyncEngine};
pub use scheduler::AutoSyncHandle;
pub use sync::{CycleOutcome, SyncReport, SyncTrigger};
pub use transport::{PushAck, RemoteApi};
pub use typed::TypedCollection;
