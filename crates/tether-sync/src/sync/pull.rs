//! Pull remote changes and apply them to the Local Store.
//!
//! Clean (or missing) records take the remote version. Dirty records go
//! through conflict detection and are never overwritten here.

use serde_json::Value;

use tether_core::models::{validate_collection, validate_document_id, Payload};
use tether_core::errors::TetherResult;
use tether_storage::operation_log;

use crate::conflict::{detect, is_remote_deletion, ResolutionStrategy};
use crate::transport::PullResponse;

use super::SyncCoordinator;

/// Result of applying one pulled change set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// Items received.
    pub pulled: usize,
    /// Items written to (or deleted from) the Local Store.
    pub applied: usize,
    /// Items that opened or refreshed a conflict case.
    pub conflicts: usize,
    /// Items that matched a dirty local record field-for-field.
    pub converged: usize,
    /// Items without a usable id.
    pub ignored: usize,
}

enum ItemOutcome {
    Applied,
    Converged,
    Conflict(tether_core::models::ConflictCase),
}

pub(crate) fn apply_changes(
    coordinator: &SyncCoordinator,
    response: PullResponse,
) -> TetherResult<PullResult> {
    let mut result = PullResult {
        pulled: response.item_count(),
        ..PullResult::default()
    };
    let id_field = coordinator.settings.id_field.as_str();

    for (collection, items) in response.changes {
        if let Err(e) = validate_collection(&collection) {
            tracing::warn!(collection = %collection, error = %e, "pulled collection ignored");
            result.ignored += items.len();
            continue;
        }
        for item in items {
            let Value::Object(payload) = item else {
                tracing::warn!(collection = %collection, "pulled item is not an object");
                result.ignored += 1;
                continue;
            };
            let Some(id) = payload
                .get(id_field)
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                tracing::warn!(collection = %collection, id_field, "pulled item has no id");
                result.ignored += 1;
                continue;
            };
            if validate_document_id(&id).is_err() {
                tracing::warn!(collection = %collection, id = %id, "pulled item has an unusable id");
                result.ignored += 1;
                continue;
            }

            match apply_item(coordinator, &collection, &id, payload)? {
                ItemOutcome::Applied => {
                    result.applied += 1;
                    coordinator.close_conflict(&collection, &id, ResolutionStrategy::Remote)?;
                }
                ItemOutcome::Converged => {
                    result.converged += 1;
                    coordinator.close_conflict(&collection, &id, ResolutionStrategy::Converged)?;
                }
                ItemOutcome::Conflict(case) => {
                    result.conflicts += 1;
                    coordinator.conflicts()?.open(case);
                }
            }
        }
    }
    Ok(result)
}

fn apply_item(
    coordinator: &SyncCoordinator,
    collection: &str,
    id: &str,
    payload: Payload,
) -> TetherResult<ItemOutcome> {
    let store = &coordinator.store;
    let now = coordinator.clock.now();
    let ignore = coordinator.conflicts()?.ignore_fields().to_vec();
    let remote_deleted = is_remote_deletion(&payload);

    store.context().transaction(|txn| {
        let local = store.read(txn, collection, id)?;
        let Some(record) = local.filter(|r| r.dirty) else {
            if remote_deleted {
                store.stage_remove(txn, collection, id)?;
            } else {
                store.stage_overwrite(txn, collection, id, payload, false)?;
            }
            return Ok(ItemOutcome::Applied);
        };

        // Deleted on both sides: the local delete has nothing left to do.
        if record.deleted && remote_deleted {
            operation_log::stage_remove_for_document(txn, collection, id)?;
            store.stage_remove(txn, collection, id)?;
            return Ok(ItemOutcome::Converged);
        }

        match detect(&record, &payload, &ignore, now) {
            Some(case) => Ok(ItemOutcome::Conflict(case)),
            None => {
                if !operation_log::stage_has_pending_for(txn, collection, id)? {
                    store.stage_mark_clean(txn, collection, id)?;
                }
                Ok(ItemOutcome::Converged)
            }
        }
    })
}
