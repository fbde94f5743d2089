//! Operation Log: durable FIFO of mutations awaiting acknowledgment, plus
//! the side list of operations that were given up on.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tether_core::errors::TetherResult;
use tether_core::models::{FailedOperation, PendingOperation};

use crate::txn::{StoreContext, Txn};

/// What happened to an operation after a failed push.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Still queued, with the updated retry count.
    Retained { retry_count: u32 },
    /// Retry budget exhausted; moved to the failed list.
    Dropped(FailedOperation),
    /// The operation was no longer in the queue.
    Missing,
}

pub struct OperationLog {
    ctx: Arc<StoreContext>,
}

impl OperationLog {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn enqueue(&self, op: PendingOperation) -> TetherResult<()> {
        self.ctx.transaction(|txn| stage_enqueue(txn, op))
    }

    /// Queue contents, oldest first.
    pub fn pending(&self) -> TetherResult<Vec<PendingOperation>> {
        self.ctx.transaction(|txn| read_pending(txn))
    }

    pub fn len(&self) -> TetherResult<usize> {
        Ok(self.pending()?.len())
    }

    pub fn is_empty(&self) -> TetherResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, op_id: &str) -> TetherResult<Option<PendingOperation>> {
        Ok(self.pending()?.into_iter().find(|op| op.id == op_id))
    }

    /// Remove an acknowledged operation. Returns the removed entry.
    pub fn remove(&self, op_id: &str) -> TetherResult<Option<PendingOperation>> {
        self.ctx.transaction(|txn| stage_remove(txn, op_id))
    }

    pub fn has_pending_for(&self, collection: &str, document_id: &str) -> TetherResult<bool> {
        Ok(self
            .pending()?
            .iter()
            .any(|op| op.targets(collection, document_id)))
    }

    /// Bump the retry count, or move the operation to the failed list once
    /// it reaches `max_retries`.
    pub fn record_failure(
        &self,
        op_id: &str,
        max_retries: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> TetherResult<FailureOutcome> {
        self.ctx.transaction(|txn| {
            let mut queue = read_pending(txn)?;
            let Some(pos) = queue.iter().position(|op| op.id == op_id) else {
                return Ok(FailureOutcome::Missing);
            };
            queue[pos].retry_count += 1;
            if queue[pos].retry_count < max_retries {
                let retry_count = queue[pos].retry_count;
                write_pending(txn, &queue)?;
                return Ok(FailureOutcome::Retained { retry_count });
            }
            let operation = queue.remove(pos);
            write_pending(txn, &queue)?;
            let failed = FailedOperation {
                operation,
                reason: reason.to_string(),
                failed_at: now,
            };
            stage_push_failed(txn, failed.clone())?;
            Ok(FailureOutcome::Dropped(failed))
        })
    }

    /// Move an operation straight to the failed list, skipping retries.
    pub fn drop_permanently(
        &self,
        op_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> TetherResult<Option<FailedOperation>> {
        self.ctx.transaction(|txn| {
            let Some(operation) = stage_remove(txn, op_id)? else {
                return Ok(None);
            };
            let failed = FailedOperation {
                operation,
                reason: reason.to_string(),
                failed_at: now,
            };
            stage_push_failed(txn, failed.clone())?;
            Ok(Some(failed))
        })
    }

    pub fn failed(&self) -> TetherResult<Vec<FailedOperation>> {
        self.ctx.transaction(|txn| read_failed(txn))
    }

    /// Put a failed operation back at the tail of the queue with a fresh
    /// retry budget.
    ///
    /// `rebuild` sees the failed operation inside the transaction and
    /// returns the operation to queue in its place, or `None` to refuse. A
    /// refused entry stays on the failed list.
    pub fn retry_failed<F>(&self, op_id: &str, rebuild: F) -> TetherResult<bool>
    where
        F: FnOnce(&mut Txn<'_>, &PendingOperation) -> TetherResult<Option<PendingOperation>>,
    {
        self.ctx.transaction(|txn| {
            let mut failed = read_failed(txn)?;
            let Some(pos) = failed.iter().position(|f| f.operation.id == op_id) else {
                return Ok(false);
            };
            let Some(mut operation) = rebuild(txn, &failed[pos].operation)? else {
                return Ok(false);
            };
            failed.remove(pos);
            operation.retry_count = 0;
            write_failed(txn, &failed)?;
            stage_enqueue(txn, operation)?;
            Ok(true)
        })
    }

    /// Forget a failed operation. Returns it so the caller can settle the
    /// record it touched.
    pub fn discard_failed(&self, op_id: &str) -> TetherResult<Option<FailedOperation>> {
        self.ctx.transaction(|txn| {
            let mut failed = read_failed(txn)?;
            let Some(pos) = failed.iter().position(|f| f.operation.id == op_id) else {
                return Ok(None);
            };
            let removed = failed.remove(pos);
            write_failed(txn, &failed)?;
            Ok(Some(removed))
        })
    }
}

// --- Staged helpers, composable with Local Store writes ---

pub fn read_pending(txn: &Txn<'_>) -> TetherResult<Vec<PendingOperation>> {
    Ok(txn
        .get_json(&txn.keys().pending_operations())?
        .unwrap_or_default())
}

fn write_pending(txn: &mut Txn<'_>, queue: &[PendingOperation]) -> TetherResult<()> {
    txn.put_json(txn.keys().pending_operations(), &queue)
}

pub fn stage_enqueue(txn: &mut Txn<'_>, op: PendingOperation) -> TetherResult<()> {
    let mut queue = read_pending(txn)?;
    tether_core::observability::events::operation_queued(
        &op.id,
        op.kind,
        &op.collection,
        &op.document_id,
    );
    queue.push(op);
    write_pending(txn, &queue)
}

pub fn stage_remove(txn: &mut Txn<'_>, op_id: &str) -> TetherResult<Option<PendingOperation>> {
    let mut queue = read_pending(txn)?;
    let Some(pos) = queue.iter().position(|op| op.id == op_id) else {
        return Ok(None);
    };
    let removed = queue.remove(pos);
    write_pending(txn, &queue)?;
    Ok(Some(removed))
}

/// Drop every queued operation for one document.
pub fn stage_remove_for_document(
    txn: &mut Txn<'_>,
    collection: &str,
    document_id: &str,
) -> TetherResult<Vec<PendingOperation>> {
    let queue = read_pending(txn)?;
    let (removed, kept): (Vec<_>, Vec<_>) = queue
        .into_iter()
        .partition(|op| op.targets(collection, document_id));
    if !removed.is_empty() {
        write_pending(txn, &kept)?;
    }
    Ok(removed)
}

pub fn stage_has_pending_for(
    txn: &Txn<'_>,
    collection: &str,
    document_id: &str,
) -> TetherResult<bool> {
    Ok(read_pending(txn)?
        .iter()
        .any(|op| op.targets(collection, document_id)))
}

fn read_failed(txn: &Txn<'_>) -> TetherResult<Vec<FailedOperation>> {
    Ok(txn
        .get_json(&txn.keys().failed_operations())?
        .unwrap_or_default())
}

fn write_failed(txn: &mut Txn<'_>, failed: &[FailedOperation]) -> TetherResult<()> {
    txn.put_json(txn.keys().failed_operations(), &failed)
}

fn stage_push_failed(txn: &mut Txn<'_>, failed: FailedOperation) -> TetherResult<()> {
    let mut list = read_failed(txn)?;
    list.push(failed);
    write_failed(txn, &list)
}
