//! Operation Log tests: FIFO order, retry accounting, failed list.

use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;

use tether_core::models::{OperationKind, PendingOperation};
use tether_storage::{FailureOutcome, KeySpace, MemoryKv, OperationLog, StoreContext};

fn log() -> OperationLog {
    let ctx = StoreContext::new(Arc::new(MemoryKv::new()), KeySpace::new("app"));
    OperationLog::new(Arc::new(ctx))
}

fn op(collection: &str, id: &str) -> PendingOperation {
    PendingOperation::new(OperationKind::Update, collection, id, None, Utc::now())
}

#[test]
fn operations_come_back_in_enqueue_order() {
    let log = log();
    let ops = [op("a", "1"), op("b", "2"), op("a", "3")];
    for o in &ops {
        log.enqueue(o.clone()).unwrap();
    }
    let ids: Vec<_> = log.pending().unwrap().into_iter().map(|o| o.id).collect();
    let expected: Vec<_> = ops.iter().map(|o| o.id.clone()).collect();
    assert_eq!(ids, expected);
}

#[test]
fn remove_takes_exactly_one_entry() {
    let log = log();
    let first = op("a", "1");
    let second = op("a", "2");
    log.enqueue(first.clone()).unwrap();
    log.enqueue(second.clone()).unwrap();

    assert_eq!(log.remove(&first.id).unwrap(), Some(first.clone()));
    assert_eq!(log.remove(&first.id).unwrap(), None);
    assert_eq!(log.pending().unwrap(), vec![second]);
}

#[test]
fn third_failure_moves_operation_to_failed_list() {
    let log = log();
    let o = op("transactions", "o1");
    log.enqueue(o.clone()).unwrap();

    let now = Utc::now();
    assert_eq!(
        log.record_failure(&o.id, 3, "network", now).unwrap(),
        FailureOutcome::Retained { retry_count: 1 }
    );
    assert_eq!(
        log.record_failure(&o.id, 3, "network", now).unwrap(),
        FailureOutcome::Retained { retry_count: 2 }
    );
    match log.record_failure(&o.id, 3, "network", now).unwrap() {
        FailureOutcome::Dropped(failed) => {
            assert_eq!(failed.operation.id, o.id);
            assert_eq!(failed.operation.retry_count, 3);
            assert_eq!(failed.reason, "network");
        }
        other => panic!("expected drop, got {other:?}"),
    }

    assert!(log.is_empty().unwrap());
    assert_eq!(log.failed().unwrap().len(), 1);
    assert_eq!(
        log.record_failure(&o.id, 3, "network", now).unwrap(),
        FailureOutcome::Missing
    );
}

#[test]
fn retry_failed_requeues_with_fresh_budget() {
    let log = log();
    let o = op("transactions", "o1");
    log.enqueue(o.clone()).unwrap();
    log.drop_permanently(&o.id, "rejected", Utc::now()).unwrap();
    assert!(log.is_empty().unwrap());

    assert!(log.retry_failed(&o.id, |_, op| Ok(Some(op.clone()))).unwrap());
    assert!(!log.retry_failed(&o.id, |_, op| Ok(Some(op.clone()))).unwrap());

    let pending = log.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].retry_count, 0);
    assert!(log.failed().unwrap().is_empty());
}

#[test]
fn refused_retry_keeps_the_failed_entry() {
    let log = log();
    let o = op("transactions", "o1");
    log.enqueue(o.clone()).unwrap();
    log.drop_permanently(&o.id, "rejected", Utc::now()).unwrap();

    assert!(!log.retry_failed(&o.id, |_, _| Ok(None)).unwrap());
    assert!(log.is_empty().unwrap());
    assert_eq!(log.failed().unwrap().len(), 1);
}

#[test]
fn discard_failed_returns_the_operation() {
    let log = log();
    let o = op("transactions", "o1");
    log.enqueue(o.clone()).unwrap();
    log.drop_permanently(&o.id, "rejected", Utc::now()).unwrap();

    let discarded = log.discard_failed(&o.id).unwrap().unwrap();
    assert_eq!(discarded.operation.document_id, "o1");
    assert!(log.discard_failed(&o.id).unwrap().is_none());
}

#[test]
fn has_pending_for_matches_collection_and_document() {
    let log = log();
    log.enqueue(op("goals", "g1")).unwrap();
    assert!(log.has_pending_for("goals", "g1").unwrap());
    assert!(!log.has_pending_for("goals", "g2").unwrap());
    assert!(!log.has_pending_for("budgets", "g1").unwrap());
}

proptest! {
    #[test]
    fn retry_count_never_decreases_and_is_bounded(max in 1u32..6, failures in 1usize..10) {
        let log = log();
        let o = op("c", "d");
        log.enqueue(o.clone()).unwrap();

        let mut last = 0;
        for _ in 0..failures {
            match log.record_failure(&o.id, max, "boom", Utc::now()).unwrap() {
                FailureOutcome::Retained { retry_count } => {
                    prop_assert!(retry_count > last);
                    prop_assert!(retry_count < max);
                    last = retry_count;
                }
                FailureOutcome::Dropped(failed) => {
                    prop_assert_eq!(failed.operation.retry_count, max);
                }
                FailureOutcome::Missing => {
                    prop_assert!(log.failed().unwrap().len() == 1);
                }
            }
        }
        let dropped = failures >= max as usize;
        prop_assert_eq!(log.is_empty().unwrap(), dropped);
    }
}
