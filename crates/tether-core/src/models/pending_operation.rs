use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Payload;

/// Mutation kinds carried by the Operation Log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A mutation waiting for remote acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Unique per operation; doubles as the idempotency key on push.
    pub id: String,
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: String,
    /// Absent for deletes.
    pub payload: Option<Payload>,
    #[serde(with = "crate::time::iso8601")]
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    /// Re-queued by a conflict resolution: the remote should accept it over
    /// its newer version.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overwrite: bool,
}

impl PendingOperation {
    pub fn new(
        kind: OperationKind,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        payload: Option<Payload>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            collection: collection.into(),
            document_id: document_id.into(),
            payload,
            created_at,
            retry_count: 0,
            overwrite: false,
        }
    }

    pub fn targets(&self, collection: &str, document_id: &str) -> bool {
        self.collection == collection && self.document_id == document_id
    }
}

/// An operation removed from the active queue without being applied remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    pub operation: PendingOperation,
    pub reason: String,
    #[serde(with = "crate::time::iso8601")]
    pub failed_at: DateTime<Utc>,
}
