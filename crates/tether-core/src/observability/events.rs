//! Structured log events for key sync operations.
//!
//! Each function emits a `tracing` event with structured fields.

use crate::models::OperationKind;

pub fn operation_queued(operation_id: &str, kind: OperationKind, collection: &str, document_id: &str) {
    tracing::debug!(
        event = "operation_queued",
        operation_id = %operation_id,
        kind = kind.as_str(),
        collection = %collection,
        document_id = %document_id,
        "operation queued"
    );
}

pub fn operation_acked(operation_id: &str, collection: &str, document_id: &str) {
    tracing::debug!(
        event = "operation_acked",
        operation_id = %operation_id,
        collection = %collection,
        document_id = %document_id,
        "operation acknowledged"
    );
}

pub fn operation_retry(operation_id: &str, retry_count: u32, reason: &str) {
    tracing::warn!(
        event = "operation_retry",
        operation_id = %operation_id,
        retry_count = retry_count,
        reason = %reason,
        "push failed, operation kept for retry"
    );
}

pub fn operation_failed(operation_id: &str, collection: &str, document_id: &str, reason: &str) {
    tracing::error!(
        event = "operation_failed",
        operation_id = %operation_id,
        collection = %collection,
        document_id = %document_id,
        reason = %reason,
        "operation dropped from queue, record left dirty"
    );
}

pub fn conflict_detected(collection: &str, document_id: &str, fields: &[String]) {
    tracing::warn!(
        event = "conflict_detected",
        collection = %collection,
        document_id = %document_id,
        fields = ?fields,
        "conflict detected"
    );
}

pub fn conflict_resolved(collection: &str, document_id: &str, strategy: &str) {
    tracing::info!(
        event = "conflict_resolved",
        collection = %collection,
        document_id = %document_id,
        strategy = %strategy,
        "conflict resolved"
    );
}

pub fn cache_cleaned(collection: &str, expired: usize, evicted: usize, remaining: usize) {
    tracing::info!(
        event = "cache_cleaned",
        collection = %collection,
        expired = expired,
        evicted = evicted,
        remaining = remaining,
        "cache cleanup"
    );
}

pub fn cycle_finished(outcome: &str, pushed: usize, pulled: usize, conflicts: usize) {
    tracing::info!(
        event = "sync_cycle_finished",
        outcome = %outcome,
        pushed = pushed,
        pulled = pulled,
        conflicts = conflicts,
        "sync cycle finished"
    );
}
