//! Versioned wire protocol: JSON bodies wrapped in a request envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tether_core::models::{OperationKind, Payload, PendingOperation};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Envelope for every request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub version: String,
    /// Unique per request, for tracing.
    pub request_id: String,
    #[serde(with = "tether_core::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_id: String,
    pub platform: String,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub device_id: String,
}

/// One queued operation on its way to the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Also sent as the `Idempotency-Key` header.
    pub operation_id: String,
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: String,
    /// Full document after the change; absent for deletes.
    pub payload: Option<Payload>,
    pub device_id: String,
    /// Asks the remote to take this write over a newer version it holds.
    #[serde(default)]
    pub overwrite: bool,
}

impl PushRequest {
    pub fn from_operation(op: &PendingOperation, device_id: &str) -> Self {
        Self {
            operation_id: op.id.clone(),
            kind: op.kind,
            collection: op.collection.clone(),
            document_id: op.document_id.clone(),
            payload: op.payload.clone(),
            device_id: device_id.to_string(),
            overwrite: op.overwrite,
        }
    }
}

/// Body of a 409 response to a push.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConflictBody {
    /// Remote version of the document, when the server includes it.
    #[serde(default)]
    pub remote: Option<serde_json::Value>,
}

/// Changes since a watermark, grouped by collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub changes: BTreeMap<String, Vec<serde_json::Value>>,
}

impl PullResponse {
    pub fn item_count(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }
}
