//! Data model shared by the store, the operation log, and the sync engine.

pub mod cached_record;
pub mod conflict_case;
pub mod identifiers;
pub mod pending_operation;
pub mod sync_state;

pub use cached_record::{payload_from_value, CachedRecord, Payload};
pub use conflict_case::{ConflictCase, ConflictKey};
pub use identifiers::{validate_collection, validate_document_id};
pub use pending_operation::{FailedOperation, OperationKind, PendingOperation};
pub use sync_state::{SyncState, SyncStatus};
