//! Persisted key layout.
//!
//! ```text
//! prefix:<collection>:<id>     CachedRecord
//! prefix:index:<collection>    [id]
//! prefix:collections           [collection]
//! prefix:pending_operations    [PendingOperation]
//! prefix:failed_operations     [FailedOperation]
//! prefix:last_sync             ISO-8601 timestamp
//! prefix:device_id             identity string
//! prefix:device_registered     "true"
//! ```

use tether_core::constants::{
    KEY_COLLECTIONS, KEY_DEVICE_ID, KEY_DEVICE_REGISTERED, KEY_FAILED_OPERATIONS, KEY_INDEX,
    KEY_LAST_SYNC, KEY_PENDING_OPERATIONS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn record(&self, collection: &str, id: &str) -> String {
        format!("{}:{collection}:{id}", self.prefix)
    }

    pub fn index(&self, collection: &str) -> String {
        format!("{}:{KEY_INDEX}:{collection}", self.prefix)
    }

    pub fn collections(&self) -> String {
        self.meta(KEY_COLLECTIONS)
    }

    pub fn pending_operations(&self) -> String {
        self.meta(KEY_PENDING_OPERATIONS)
    }

    pub fn failed_operations(&self) -> String {
        self.meta(KEY_FAILED_OPERATIONS)
    }

    pub fn last_sync(&self) -> String {
        self.meta(KEY_LAST_SYNC)
    }

    pub fn device_id(&self) -> String {
        self.meta(KEY_DEVICE_ID)
    }

    pub fn device_registered(&self) -> String {
        self.meta(KEY_DEVICE_REGISTERED)
    }

    fn meta(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }
}
