//! Conflict resolution: explicit `local`, `remote`, or field-level `merge`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tether_core::errors::{ConflictError, TetherResult};
use tether_core::models::{ConflictCase, OperationKind, Payload, PendingOperation};
use tether_storage::operation_log;
use tether_storage::{LocalStore, Txn};

use super::detection::{conflicted_fields, is_remote_deletion};

/// How a conflict case was (or is being) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Local,
    Remote,
    Merge,
    /// A later pull brought the remote in line with the local record.
    Converged,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merge => "merge",
            Self::Converged => "converged",
        }
    }
}

/// Per-field pick for a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChoice {
    Local,
    Remote,
    Value(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeResolution {
    pub choices: BTreeMap<String, FieldChoice>,
    /// A final merge closes the case; otherwise it stays open.
    pub is_final: bool,
}

impl MergeResolution {
    pub fn new(is_final: bool) -> Self {
        Self {
            choices: BTreeMap::new(),
            is_final,
        }
    }

    pub fn choose(mut self, field: impl Into<String>, choice: FieldChoice) -> Self {
        self.choices.insert(field.into(), choice);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Local,
    Remote,
    Merge(MergeResolution),
}

impl Resolution {
    pub fn strategy(&self) -> ResolutionStrategy {
        match self {
            Self::Local => ResolutionStrategy::Local,
            Self::Remote => ResolutionStrategy::Remote,
            Self::Merge(_) => ResolutionStrategy::Merge,
        }
    }
}

/// What applying a resolution did to the case.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionEffect {
    Closed,
    /// Non-final merge: the case stays open against the merged payload.
    StillOpen {
        local_payload: Payload,
        conflicted_fields: Vec<String>,
    },
}

/// Build the merged payload. Every conflicted field needs a choice; fields
/// outside the conflict keep the local value unless a choice overrides them.
pub fn merge_payload(case: &ConflictCase, merge: &MergeResolution) -> TetherResult<Payload> {
    let missing: Vec<String> = case
        .conflicted_fields
        .iter()
        .filter(|f| !merge.choices.contains_key(*f))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ConflictError::IncompleteMerge {
            collection: case.collection.clone(),
            id: case.id.clone(),
            missing,
        }
        .into());
    }

    let mut merged = case.local_payload.clone();
    for (field, choice) in &merge.choices {
        let value = match choice {
            FieldChoice::Local => case.local_payload.get(field).cloned(),
            FieldChoice::Remote => case.remote_payload.get(field).cloned(),
            FieldChoice::Value(v) => Some(v.clone()),
        };
        match value {
            Some(v) => {
                merged.insert(field.clone(), v);
            }
            None => {
                merged.remove(field);
            }
        }
    }
    Ok(merged)
}

/// Apply `resolution` to the Local Store and Operation Log in one batch.
pub fn apply_resolution(
    store: &LocalStore,
    case: &ConflictCase,
    resolution: &Resolution,
    ignore: &[String],
    now: DateTime<Utc>,
) -> TetherResult<ResolutionEffect> {
    let (collection, id) = (case.collection.as_str(), case.id.as_str());
    match resolution {
        Resolution::Local => {
            store.context().transaction(|txn| {
                operation_log::stage_remove_for_document(txn, collection, id)?;
                let op = match store.read(txn, collection, id)? {
                    Some(record) if record.deleted => {
                        PendingOperation::new(OperationKind::Delete, collection, id, None, now)
                    }
                    Some(record) => PendingOperation::new(
                        OperationKind::Update,
                        collection,
                        id,
                        Some(record.payload),
                        now,
                    ),
                    None => {
                        store.stage_overwrite(txn, collection, id, case.local_payload.clone(), true)?;
                        PendingOperation::new(
                            OperationKind::Update,
                            collection,
                            id,
                            Some(case.local_payload.clone()),
                            now,
                        )
                    }
                };
                enqueue_overwrite(txn, op)
            })?;
            Ok(ResolutionEffect::Closed)
        }
        Resolution::Remote => {
            store
                .context()
                .transaction(|txn| accept_remote(store, txn, case, case.remote_payload.clone()))?;
            Ok(ResolutionEffect::Closed)
        }
        Resolution::Merge(merge) => {
            let merged = merge_payload(case, merge)?;
            let remaining = conflicted_fields(&merged, &case.remote_payload, ignore);

            if !merge.is_final {
                store.context().transaction(|txn| {
                    store.stage_overwrite(txn, collection, id, merged.clone(), true)
                })?;
                return Ok(ResolutionEffect::StillOpen {
                    local_payload: merged,
                    conflicted_fields: remaining,
                });
            }

            if remaining.is_empty() && !is_remote_deletion(&case.remote_payload) {
                store
                    .context()
                    .transaction(|txn| accept_remote(store, txn, case, merged))?;
            } else {
                store.context().transaction(|txn| {
                    operation_log::stage_remove_for_document(txn, collection, id)?;
                    store.stage_overwrite(txn, collection, id, merged.clone(), true)?;
                    let op = PendingOperation::new(
                        OperationKind::Update,
                        collection,
                        id,
                        Some(merged.clone()),
                        now,
                    );
                    enqueue_overwrite(txn, op)
                })?;
            }
            Ok(ResolutionEffect::Closed)
        }
    }
}

/// Take `payload` as the settled remote state: drop queued work for the
/// document and store it clean, or remove the record on a remote deletion.
fn accept_remote(
    store: &LocalStore,
    txn: &mut Txn<'_>,
    case: &ConflictCase,
    payload: Payload,
) -> TetherResult<()> {
    operation_log::stage_remove_for_document(txn, &case.collection, &case.id)?;
    if is_remote_deletion(&payload) {
        store.stage_remove(txn, &case.collection, &case.id)?;
    } else {
        store.stage_overwrite(txn, &case.collection, &case.id, payload, false)?;
    }
    Ok(())
}

fn enqueue_overwrite(txn: &mut Txn<'_>, mut op: PendingOperation) -> TetherResult<()> {
    op.overwrite = true;
    operation_log::stage_enqueue(txn, op)
}
