use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Payload;

/// `(collection, id)` pair identifying a document across the engine.
pub type ConflictKey = (String, String);

/// A dirty local record that diverges from an incoming remote version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCase {
    pub id: String,
    pub collection: String,
    pub local_payload: Payload,
    pub remote_payload: Payload,
    /// Top-level fields whose values differ, sorted.
    pub conflicted_fields: Vec<String>,
    #[serde(with = "crate::time::iso8601")]
    pub detected_at: DateTime<Utc>,
}

impl ConflictCase {
    pub fn key(&self) -> ConflictKey {
        (self.collection.clone(), self.id.clone())
    }
}
