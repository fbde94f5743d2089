//! Conflict detection: shallow comparison of a dirty local record against an
//! incoming remote version.
//!
//! Only top-level fields are compared. A nested object that differs anywhere
//! inside is reported as one conflicted field.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use tether_core::constants::DELETED_MARKER_FIELD;
use tether_core::models::{CachedRecord, ConflictCase, Payload};

/// Whether a pulled payload marks a remote deletion.
pub fn is_remote_deletion(payload: &Payload) -> bool {
    matches!(payload.get(DELETED_MARKER_FIELD), Some(Value::Bool(true)))
}

/// Fields present on either side whose values differ, sorted. A field
/// missing on one side counts as different.
pub fn conflicted_fields(local: &Payload, remote: &Payload, ignore: &[String]) -> Vec<String> {
    let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();
    keys.into_iter()
        .filter(|k| !ignore.iter().any(|i| i == *k))
        .filter(|k| local.get(k.as_str()) != remote.get(k.as_str()))
        .cloned()
        .collect()
}

/// A conflict case when `record` is dirty and diverges from `remote`.
///
/// A remote deletion against a dirty record conflicts on every local field.
pub fn detect(
    record: &CachedRecord,
    remote: &Payload,
    ignore: &[String],
    now: DateTime<Utc>,
) -> Option<ConflictCase> {
    if !record.dirty {
        return None;
    }
    let fields = if is_remote_deletion(remote) {
        let mut fields: Vec<String> = record
            .payload
            .keys()
            .filter(|k| !ignore.contains(*k))
            .cloned()
            .collect();
        if fields.is_empty() {
            fields.push(DELETED_MARKER_FIELD.to_string());
        }
        fields
    } else {
        conflicted_fields(&record.payload, remote, ignore)
    };
    if fields.is_empty() {
        return None;
    }
    Some(ConflictCase {
        id: record.id.clone(),
        collection: record.collection.clone(),
        local_payload: record.payload.clone(),
        remote_payload: remote.clone(),
        conflicted_fields: fields,
        detected_at: now,
    })
}
