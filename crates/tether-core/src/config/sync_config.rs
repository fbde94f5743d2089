use serde::{Deserialize, Serialize};

use super::defaults;

/// Remote endpoint and sync cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the remote API (`apiBaseUrl`).
    pub api_base_url: String,
    /// Bearer token forwarded on every request (`authToken`).
    pub auth_token: Option<String>,
    /// Account the device belongs to (`userId`).
    pub user_id: Option<String>,
    /// Interval between timer-triggered cycles (`autoSyncIntervalMs`).
    pub auto_sync_interval_ms: u64,
    /// Timeout applied to each remote call.
    pub request_timeout_ms: u64,
    /// Failed pushes before an operation is dropped.
    pub max_retries: u32,
    /// Payload field carrying the document id in pulled items.
    pub id_field: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            user_id: None,
            auto_sync_interval_ms: defaults::DEFAULT_AUTO_SYNC_INTERVAL_MS,
            request_timeout_ms: defaults::DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            id_field: defaults::DEFAULT_ID_FIELD.to_string(),
        }
    }
}
