//! # tether-storage
//!
//! Persistence for the Tether sync engine: key/value backends (SQLite and
//! in-memory), the persisted key layout, the Local Store, the Operation Log,
//! sync metadata, and the cache governor.
//!
//! Every read-modify-write runs inside a [`Txn`] under the store lock, so a
//! record write and its queued operation land in the same atomic batch.

pub mod governor;
pub mod keys;
pub mod local_store;
pub mod memory;
pub mod metadata;
pub mod operation_log;
pub mod sqlite;
pub mod txn;

use tether_core::errors::{StorageError, TetherError};

pub use governor::{CacheGovernor, CleanupReport};
pub use keys::KeySpace;
pub use local_store::{LocalStore, PutOutcome};
pub use memory::MemoryKv;
pub use metadata::SyncMetadata;
pub use operation_log::{FailureOutcome, OperationLog};
pub use sqlite::SqliteKv;
pub use txn::{StoreContext, Txn};

/// Convert a backend error message into a [`TetherError`].
pub(crate) fn to_storage_err(message: String) -> TetherError {
    StorageError::SqliteError { message }.into()
}

pub(crate) fn lock_err(resource: &str) -> TetherError {
    StorageError::LockPoisoned {
        resource: resource.to_string(),
    }
    .into()
}
