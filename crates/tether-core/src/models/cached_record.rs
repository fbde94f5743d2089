use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Loosely-typed entity body. Always a JSON object at the top level.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One cached entity in the Local Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord {
    pub id: String,
    pub collection: String,
    pub payload: Payload,
    /// Local changes not yet acknowledged by the remote.
    pub dirty: bool,
    #[serde(with = "crate::time::iso8601")]
    pub last_modified: DateTime<Utc>,
    /// Local delete awaiting acknowledgment. Hidden from reads.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl CachedRecord {
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        payload: Payload,
        dirty: bool,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload,
            dirty,
            last_modified,
            deleted: false,
        }
    }

    /// Expired entries are non-dirty and strictly older than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        !self.dirty && now - self.last_modified > ttl
    }
}

/// Accept a JSON value as a payload only when it is an object.
pub fn payload_from_value(
    collection: &str,
    id: &str,
    value: serde_json::Value,
) -> Result<Payload, ValidationError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ValidationError::PayloadNotObject {
            collection: collection.to_string(),
            id: id.to_string(),
        }),
    }
}
