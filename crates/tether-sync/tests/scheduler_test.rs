//! Background auto-sync task.

mod common;

use std::time::Duration;

use serde_json::json;

use tether_core::traits::Connectivity;
use tether_core::TetherConfig;
use tether_sync::scheduler;
use tether_sync::SyncTrigger;

use common::{harness, harness_with, ScriptedRemote};

const LONG: Duration = Duration::from_secs(3600);

/// Poll until `check` holds or a second has passed.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn reconnect_edge_runs_a_cycle() {
    let h = harness_with(
        TetherConfig::default(),
        ScriptedRemote::new(),
        Connectivity::Offline,
    );
    h.engine.create("a", json!({"id": "1"})).unwrap();
    let handle = scheduler::spawn(h.engine.clone(), LONG);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.remote.push_count(), 0);

    h.notifier.set(Connectivity::Online);
    assert!(eventually(|| h.remote.push_count() == 1).await);
    assert!(eventually(|| h.engine.status().unwrap().pending_operations == 0).await);

    handle.shutdown().await;
}

#[tokio::test]
async fn manual_trigger_runs_a_cycle() {
    let h = harness();
    h.engine.create("a", json!({"id": "1"})).unwrap();
    let handle = scheduler::spawn(h.engine.clone(), LONG);

    assert!(handle.trigger(SyncTrigger::Foreground).await);
    assert!(eventually(|| h.remote.push_count() == 1).await);

    handle.shutdown().await;
}

#[tokio::test]
async fn timer_ticks_run_cycles_only_while_online() {
    let mut config = TetherConfig::default();
    config.sync.auto_sync_interval_ms = 20;
    let h = harness_with(config, ScriptedRemote::new(), Connectivity::Offline);
    let handle = h.engine.start_auto_sync();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.remote.state.lock().unwrap().heartbeats, 0);

    h.notifier.set(Connectivity::Online);
    assert!(eventually(|| h.remote.state.lock().unwrap().heartbeats >= 2).await);

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_task() {
    let h = harness();
    let handle = scheduler::spawn(h.engine.clone(), LONG);
    handle.shutdown().await;

    h.notifier.set(Connectivity::Offline);
    h.notifier.set(Connectivity::Online);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.remote.state.lock().unwrap().heartbeats, 0);
}
