//! Conflict detection properties and resolution flows.

mod common;

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use tether_core::errors::ErrorKind;
use tether_core::models::{CachedRecord, ConflictCase, OperationKind, Payload};
use tether_sync::conflict::{conflicted_fields, detect, merge_payload};
use tether_sync::{CycleOutcome, FieldChoice, MergeResolution, Resolution, ResolutionEffect, SyncTrigger};

use common::{harness, payload, Harness, Scripted};

/// Clean g1 on both sides, then a local edit that meets a different remote
/// edit of the same goal.
async fn diverged_goal() -> Harness {
    let h = harness();
    h.engine
        .create("goals", json!({"id": "g1", "name": "house", "target": 10}))
        .unwrap();
    h.engine.sync(SyncTrigger::Manual).await.unwrap();

    h.engine
        .update("goals", "g1", json!({"target": 20}))
        .unwrap();
    h.remote.script_push([Scripted::Conflict(None)]);
    h.remote
        .publish("goals", json!({"id": "g1", "name": "flat", "target": 15}));
    let report = h.engine.sync(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Conflicted);
    h.remote.clear_changes();
    h
}

#[tokio::test]
async fn open_case_holds_queued_work_for_its_document() {
    let h = diverged_goal().await;
    h.engine.create("budgets", json!({"id": "b1"})).unwrap();
    let pushes_before = h.remote.push_count();

    let report = h.engine.sync(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.pushed, 1);
    assert_eq!(h.remote.push_count(), pushes_before + 1);
    assert!(h.remote.document("budgets", "b1").is_some());
    assert_eq!(h.engine.status().unwrap().unresolved_conflicts, 1);
}

#[tokio::test]
async fn local_resolution_requeues_with_overwrite() {
    let h = diverged_goal().await;
    let effect = h
        .engine
        .resolve_conflict("goals", "g1", Resolution::Local)
        .unwrap();
    assert_eq!(effect, ResolutionEffect::Closed);

    let ops = h.engine.pending_operations().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Update);
    assert!(ops[0].overwrite);
    assert_eq!(ops[0].payload.as_ref().unwrap()["target"], 20);

    h.engine.sync(SyncTrigger::Manual).await.unwrap();
    let last = h.remote.state.lock().unwrap().pushes.last().cloned().unwrap();
    assert!(last.overwrite);
    assert_eq!(h.remote.document("goals", "g1").unwrap()["target"], 20);
    assert_eq!(h.remote.document("goals", "g1").unwrap()["name"], "house");
    assert!(!h.engine.get("goals", "g1").unwrap().unwrap().dirty);
}

#[tokio::test]
async fn merge_stays_open_until_final() {
    let h = diverged_goal().await;
    let case = &h.engine.unresolved_conflicts().unwrap()[0];
    assert_eq!(case.conflicted_fields, vec!["name", "target"]);

    let partial = MergeResolution::new(false)
        .choose("name", FieldChoice::Remote)
        .choose("target", FieldChoice::Value(json!(18)));
    let effect = h
        .engine
        .resolve_conflict("goals", "g1", Resolution::Merge(partial))
        .unwrap();
    let ResolutionEffect::StillOpen {
        local_payload,
        conflicted_fields,
    } = effect
    else {
        panic!("non-final merge closed the case");
    };
    assert_eq!(conflicted_fields, vec!["target"]);
    assert_eq!(local_payload["name"], "flat");

    let stored = h.engine.get("goals", "g1").unwrap().unwrap();
    assert!(stored.dirty);
    assert_eq!(stored.payload["target"], 18);
    assert_eq!(
        h.engine.unresolved_conflicts().unwrap()[0].conflicted_fields,
        vec!["target"]
    );

    let finish = MergeResolution::new(true).choose("target", FieldChoice::Remote);
    let effect = h
        .engine
        .resolve_conflict("goals", "g1", Resolution::Merge(finish))
        .unwrap();
    assert_eq!(effect, ResolutionEffect::Closed);

    // The merge ended up equal to the remote version: nothing left to push.
    let stored = h.engine.get("goals", "g1").unwrap().unwrap();
    assert!(!stored.dirty);
    assert_eq!(stored.payload["target"], 15);
    assert!(h.engine.pending_operations().unwrap().is_empty());
    assert!(h.engine.unresolved_conflicts().unwrap().is_empty());
}

#[tokio::test]
async fn final_merge_with_new_values_is_pushed_as_overwrite() {
    let h = diverged_goal().await;
    let merge = MergeResolution::new(true)
        .choose("name", FieldChoice::Local)
        .choose("target", FieldChoice::Remote);
    h.engine
        .resolve_conflict("goals", "g1", Resolution::Merge(merge))
        .unwrap();

    let ops = h.engine.pending_operations().unwrap();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].overwrite);
    let body = ops[0].payload.as_ref().unwrap();
    assert_eq!(body["name"], "house");
    assert_eq!(body["target"], 15);

    let history = h.engine.conflict_history().unwrap();
    assert_eq!(history.last().unwrap().strategy.map(|s| s.as_str()), Some("merge"));
}

#[tokio::test]
async fn incomplete_merge_is_rejected_and_case_stays() {
    let h = diverged_goal().await;
    let merge = MergeResolution::new(true).choose("name", FieldChoice::Remote);
    let err = h
        .engine
        .resolve_conflict("goals", "g1", Resolution::Merge(merge))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.engine.unresolved_conflicts().unwrap().len(), 1);
    assert_eq!(h.engine.get("goals", "g1").unwrap().unwrap().payload["target"], 20);

    let missing = h
        .engine
        .resolve_conflict("goals", "nope", Resolution::Remote)
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn remote_deletion_of_dirty_record_conflicts() {
    let h = harness();
    h.engine
        .create("budgets", json!({"id": "b1", "limit": 10}))
        .unwrap();
    h.engine.sync(SyncTrigger::Manual).await.unwrap();
    h.engine
        .update("budgets", "b1", json!({"limit": 12}))
        .unwrap();
    h.remote.script_push([Scripted::Conflict(None)]);
    h.remote
        .publish("budgets", json!({"id": "b1", "_deleted": true}));

    let report = h.engine.sync(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Conflicted);
    let case = &h.engine.unresolved_conflicts().unwrap()[0];
    assert!(case.conflicted_fields.contains(&"limit".to_string()));
    assert!(h.engine.get("budgets", "b1").unwrap().is_some());

    h.engine
        .resolve_conflict("budgets", "b1", Resolution::Remote)
        .unwrap();
    assert!(h.engine.get("budgets", "b1").unwrap().is_none());
    assert!(h.engine.pending_operations().unwrap().is_empty());
}

#[tokio::test]
async fn push_conflict_with_remote_body_opens_case_immediately() {
    let h = harness();
    h.engine
        .create("goals", json!({"id": "g7", "target": 1}))
        .unwrap();
    h.remote.script_push([Scripted::Conflict(Some(payload(
        json!({"id": "g7", "target": 2}),
    )))]);

    let report = h.engine.sync(SyncTrigger::Manual).await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::Conflicted);
    let cases = h.engine.unresolved_conflicts().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].conflicted_fields, vec!["target"]);
    // The push conflict costs no retry.
    assert_eq!(h.engine.pending_operations().unwrap()[0].retry_count, 0);
}

#[tokio::test]
async fn later_pull_matching_local_closes_case_as_converged() {
    let h = diverged_goal().await;
    h.remote
        .publish("goals", json!({"id": "g1", "name": "house", "target": 20}));
    h.engine.sync(SyncTrigger::Manual).await.unwrap();

    assert!(h.engine.unresolved_conflicts().unwrap().is_empty());
    let history = h.engine.conflict_history().unwrap();
    assert_eq!(
        history.last().unwrap().strategy.map(|s| s.as_str()),
        Some("converged")
    );
}

fn case_for(local: Payload, remote: Payload) -> ConflictCase {
    let fields = conflicted_fields(&local, &remote, &[]);
    ConflictCase {
        id: "x".into(),
        collection: "c".into(),
        local_payload: local,
        remote_payload: remote,
        conflicted_fields: fields,
        detected_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[test]
fn merge_choices_may_touch_fields_outside_the_conflict() {
    let case = case_for(
        payload(json!({"a": 1, "b": 1})),
        payload(json!({"a": 2, "b": 1})),
    );
    let merge = MergeResolution::new(true)
        .choose("a", FieldChoice::Remote)
        .choose("c", FieldChoice::Value(json!("new")));
    let merged = merge_payload(&case, &merge).unwrap();
    assert_eq!(merged, payload(json!({"a": 2, "b": 1, "c": "new"})));
}

#[test]
fn choosing_an_absent_side_removes_the_field() {
    let case = case_for(payload(json!({"a": 1, "x": true})), payload(json!({"a": 1})));
    let merge = MergeResolution::new(true).choose("x", FieldChoice::Remote);
    let merged = merge_payload(&case, &merge).unwrap();
    assert!(!merged.contains_key("x"));
}

fn small_payload() -> impl Strategy<Value = BTreeMap<String, i64>> {
    prop::collection::btree_map("[a-e]", 0i64..3, 0..5)
}

fn to_payload(map: &BTreeMap<String, i64>) -> Payload {
    map.iter()
        .map(|(k, v)| (k.clone(), Value::from(*v)))
        .collect()
}

proptest! {
    #[test]
    fn flags_exactly_the_differing_keys(local in small_payload(), remote in small_payload()) {
        let fields = conflicted_fields(&to_payload(&local), &to_payload(&remote), &[]);
        for key in ["a", "b", "c", "d", "e"] {
            let differs = local.get(key) != remote.get(key);
            prop_assert_eq!(fields.contains(&key.to_string()), differs, "key {}", key);
        }
        let mut sorted = fields.clone();
        sorted.sort();
        prop_assert_eq!(sorted, fields);
    }

    #[test]
    fn ignored_fields_never_conflict(local in small_payload(), remote in small_payload()) {
        let ignore = vec!["a".to_string(), "b".to_string()];
        let fields = conflicted_fields(&to_payload(&local), &to_payload(&remote), &ignore);
        prop_assert!(fields.iter().all(|f| f != "a" && f != "b"));
    }

    #[test]
    fn clean_records_never_conflict(local in small_payload(), remote in small_payload()) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = CachedRecord::new("c", "x", to_payload(&local), false, now);
        prop_assert!(detect(&record, &to_payload(&remote), &[], now).is_none());
    }
}

#[tokio::test]
async fn repeated_cycles_keep_one_history_entry_per_conflict() {
    let h = diverged_goal().await;
    h.remote
        .publish("goals", json!({"id": "g1", "name": "flat", "target": 16}));
    for _ in 0..3 {
        let report = h.engine.sync(SyncTrigger::Manual).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::Conflicted);
    }
    let cases = h.engine.unresolved_conflicts().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].remote_payload["target"], 16);

    h.engine
        .resolve_conflict("goals", "g1", Resolution::Remote)
        .unwrap();
    let history = h.engine.conflict_history().unwrap();
    assert_eq!(history.len(), 1);
    assert!(history.iter().all(|r| r.resolved_at.is_some()));
    assert_eq!(h.engine.get("goals", "g1").unwrap().unwrap().payload["target"], 16);
}
