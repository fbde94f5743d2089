use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide sync state. Only `device_id` and `last_sync_time` are persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub device_id: Option<String>,
    #[serde(with = "crate::time::iso8601_option")]
    pub last_sync_time: Option<DateTime<Utc>>,
    pub online: bool,
    pub sync_in_progress: bool,
    pub pending_count: usize,
}

/// User-facing status view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub online: bool,
    pub pending_operations: usize,
    pub failed_operations: usize,
    pub unresolved_conflicts: usize,
    pub sync_in_progress: bool,
    #[serde(with = "crate::time::iso8601_option")]
    pub last_sync_time: Option<DateTime<Utc>>,
}
