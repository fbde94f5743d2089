//! Drain the Operation Log to the remote.
//!
//! One remote call per operation, in queue order. A transient failure in a
//! collection parks the rest of that collection until the next cycle so
//! per-collection submission order holds.

use std::collections::HashSet;

use tether_core::errors::{RemoteError, TetherError, TetherResult};
use tether_core::models::{FailedOperation, OperationKind, PendingOperation};
use tether_core::observability::events;
use tether_storage::operation_log;
use tether_storage::FailureOutcome;

use crate::conflict::detect;
use crate::transport::{with_timeout, PushAck, PushRequest};

use super::SyncCoordinator;

/// Result of one drain pass.
#[derive(Debug, Default)]
pub struct PushResult {
    /// Acknowledged by the remote.
    pub pushed: usize,
    /// Failed this pass, whether kept for retry or dropped.
    pub failed: usize,
    /// Not attempted this pass.
    pub skipped: usize,
    /// Push answered with a conflict indication.
    pub conflicts: usize,
    /// Dropped from the queue this pass.
    pub dropped: Vec<FailedOperation>,
}

pub(crate) async fn drain_pending(
    coordinator: &SyncCoordinator,
    device_id: &str,
) -> TetherResult<PushResult> {
    let queue = coordinator.log.pending()?;

    let mut result = PushResult::default();
    let mut parked: HashSet<String> = HashSet::new();

    for op in queue {
        if parked.contains(&op.collection) {
            result.skipped += 1;
            continue;
        }
        if coordinator.has_open_conflict(&op.collection, &op.document_id)? {
            tracing::debug!(
                operation_id = %op.id,
                collection = %op.collection,
                document_id = %op.document_id,
                "operation held until its conflict is resolved"
            );
            result.skipped += 1;
            continue;
        }

        let request = PushRequest::from_operation(&op, device_id);
        let outcome = with_timeout(
            coordinator.settings.request_timeout,
            coordinator.remote.push_operation(&request),
        )
        .await;

        match outcome {
            Ok(PushAck::Accepted) => {
                acknowledge(coordinator, &op)?;
                events::operation_acked(&op.id, &op.collection, &op.document_id);
                result.pushed += 1;
            }
            Ok(PushAck::Conflict { remote }) => {
                result.conflicts += 1;
                parked.insert(op.collection.clone());
                if let Some(remote) = remote {
                    open_push_conflict(coordinator, &op, &remote)?;
                }
            }
            Err(TetherError::Remote(RemoteError::Rejected { status, reason })) => {
                let reason = format!("rejected by remote (HTTP {status}): {reason}");
                let now = coordinator.clock.now();
                if let Some(failed) = coordinator.log.drop_permanently(&op.id, &reason, now)? {
                    events::operation_failed(&op.id, &op.collection, &op.document_id, &reason);
                    result.dropped.push(failed);
                }
                result.failed += 1;
            }
            Err(e) if e.is_transient() => {
                let reason = e.to_string();
                let now = coordinator.clock.now();
                match coordinator.log.record_failure(
                    &op.id,
                    coordinator.settings.max_retries,
                    &reason,
                    now,
                )? {
                    FailureOutcome::Retained { retry_count } => {
                        events::operation_retry(&op.id, retry_count, &reason);
                    }
                    FailureOutcome::Dropped(failed) => {
                        events::operation_failed(&op.id, &op.collection, &op.document_id, &reason);
                        result.dropped.push(failed);
                    }
                    FailureOutcome::Missing => {}
                }
                result.failed += 1;
                parked.insert(op.collection.clone());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}

/// Remove the acknowledged operation and settle the record once nothing
/// else is queued for it.
fn acknowledge(coordinator: &SyncCoordinator, op: &PendingOperation) -> TetherResult<()> {
    let store = &coordinator.store;
    store.context().transaction(|txn| {
        operation_log::stage_remove(txn, &op.id)?;
        if operation_log::stage_has_pending_for(txn, &op.collection, &op.document_id)? {
            return Ok(());
        }
        match op.kind {
            OperationKind::Delete => {
                if let Some(record) = store.read(txn, &op.collection, &op.document_id)? {
                    if record.deleted {
                        store.stage_remove(txn, &op.collection, &op.document_id)?;
                    }
                }
            }
            OperationKind::Create | OperationKind::Update => {
                store.stage_mark_clean(txn, &op.collection, &op.document_id)?;
            }
        }
        Ok(())
    })
}

fn open_push_conflict(
    coordinator: &SyncCoordinator,
    op: &PendingOperation,
    remote: &tether_core::models::Payload,
) -> TetherResult<()> {
    let Some(record) = coordinator.store.peek(&op.collection, &op.document_id)? else {
        return Ok(());
    };
    let mut conflicts = coordinator.conflicts()?;
    if let Some(case) = detect(
        &record,
        remote,
        conflicts.ignore_fields(),
        coordinator.clock.now(),
    ) {
        conflicts.open(case);
    }
    Ok(())
}
