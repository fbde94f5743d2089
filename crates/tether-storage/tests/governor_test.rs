//! Cache governor tests: TTL pass, capacity pass, dirty records untouched.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

use tether_core::models::Payload;
use tether_core::traits::ManualClock;
use tether_storage::{CacheGovernor, CleanupReport, KeySpace, LocalStore, MemoryKv, StoreContext};

fn setup(max: usize) -> (Arc<ManualClock>, Arc<LocalStore>, CacheGovernor) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    ));
    let ctx = Arc::new(StoreContext::new(
        Arc::new(MemoryKv::new()),
        KeySpace::new("app"),
    ));
    let store = Arc::new(LocalStore::new(ctx, clock.clone(), Duration::hours(24)));
    let governor = CacheGovernor::new(store.clone(), clock.clone(), max);
    (clock, store, governor)
}

fn body(n: usize) -> Payload {
    json!({ "n": n }).as_object().cloned().unwrap()
}

#[test]
fn capacity_pass_keeps_dirty_entries_above_the_cap() {
    let (clock, store, governor) = setup(1000);
    for i in 0..1005 {
        store
            .put("transactions", &format!("c{i:04}"), body(i), false)
            .unwrap();
        clock.advance(Duration::seconds(1));
    }
    for i in 0..5 {
        store
            .put("transactions", &format!("d{i}"), body(i), true)
            .unwrap();
    }

    let report = governor.cleanup("transactions").unwrap();
    assert_eq!(
        report,
        CleanupReport {
            expired: 0,
            evicted: 5,
            remaining: 1005
        }
    );

    let live = store.get_all("transactions").unwrap();
    assert_eq!(live.len(), 1005);
    assert_eq!(live.iter().filter(|r| r.dirty).count(), 5);
    for i in 0..5 {
        assert!(
            store.peek("transactions", &format!("c{i:04}")).unwrap().is_none(),
            "oldest clean entries go first"
        );
    }
    assert!(store.peek("transactions", "c0005").unwrap().is_some());
}

#[test]
fn ttl_pass_runs_before_capacity_pass() {
    let (clock, store, governor) = setup(2);
    store.put("goals", "stale", body(0), false).unwrap();
    clock.advance(Duration::hours(30));
    for id in ["a", "b", "c"] {
        store.put("goals", id, body(1), false).unwrap();
        clock.advance(Duration::minutes(1));
    }

    let report = governor.cleanup("goals").unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(report.remaining, 2);
    assert!(store.peek("goals", "a").unwrap().is_none());
}

#[test]
fn equal_timestamps_evict_by_id() {
    let (_clock, store, governor) = setup(1);
    for id in ["b", "a", "c"] {
        store.put("budgets", id, body(0), false).unwrap();
    }
    governor.cleanup("budgets").unwrap();
    let ids: Vec<_> = store
        .get_all("budgets")
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["c"]);
}

#[test]
fn cleanup_all_sums_every_collection() {
    let (clock, store, governor) = setup(10);
    store.put("a", "1", body(0), false).unwrap();
    store.put("b", "1", body(0), false).unwrap();
    store.put("b", "2", body(0), true).unwrap();
    clock.advance(Duration::hours(48));

    let total = governor.cleanup_all().unwrap();
    assert_eq!(total.expired, 2);
    assert_eq!(total.remaining, 1);
}

proptest! {
    #[test]
    fn eviction_never_removes_dirty_records(
        flags in proptest::collection::vec(any::<bool>(), 1..40),
        max in 1usize..20,
        age_hours in 0i64..48,
    ) {
        let (clock, store, governor) = setup(max);
        for (i, dirty) in flags.iter().enumerate() {
            store.put("c", &format!("r{i}"), body(i), *dirty).unwrap();
            clock.advance(Duration::seconds(1));
        }
        clock.advance(Duration::hours(age_hours));

        governor.cleanup("c").unwrap();

        for (i, dirty) in flags.iter().enumerate() {
            if *dirty {
                let key = format!("r{i}");
                prop_assert!(store.peek("c", &key).unwrap().is_some());
            }
        }
        let remaining = store.entries("c").unwrap();
        let clean = remaining.iter().filter(|r| !r.dirty).count();
        prop_assert!(clean <= max || remaining.len() <= max);
    }
}
