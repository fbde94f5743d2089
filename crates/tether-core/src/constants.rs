/// Tether version.
pub const TETHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Payload marker for remote deletions in pulled change sets.
pub const DELETED_MARKER_FIELD: &str = "_deleted";

// Key-layout segments that follow the configured prefix.
pub const KEY_INDEX: &str = "index";
pub const KEY_COLLECTIONS: &str = "collections";
pub const KEY_PENDING_OPERATIONS: &str = "pending_operations";
pub const KEY_FAILED_OPERATIONS: &str = "failed_operations";
pub const KEY_LAST_SYNC: &str = "last_sync";
pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_DEVICE_REGISTERED: &str = "device_registered";

/// Collection names that would collide with metadata keys.
pub const RESERVED_COLLECTIONS: &[&str] = &[
    KEY_INDEX,
    KEY_COLLECTIONS,
    KEY_PENDING_OPERATIONS,
    KEY_FAILED_OPERATIONS,
    KEY_LAST_SYNC,
    KEY_DEVICE_ID,
    KEY_DEVICE_REGISTERED,
];
