//! Auto-sync: interval timer, reconnect edges, and explicit triggers feeding
//! cycles to the engine from one background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::SyncEngine;
use crate::sync::SyncTrigger;

const TRIGGER_QUEUE: usize = 16;

/// Control handle for a running scheduler task.
pub struct AutoSyncHandle {
    triggers: mpsc::Sender<SyncTrigger>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Ask for a cycle. Returns `false` once the scheduler has stopped.
    pub async fn trigger(&self, trigger: SyncTrigger) -> bool {
        self.triggers.send(trigger).await.is_ok()
    }

    /// Stop the task and wait for it. A cycle already running finishes first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "auto-sync task ended abnormally");
        }
    }
}

/// Start the scheduler on the current tokio runtime.
pub fn spawn(engine: Arc<SyncEngine>, interval: Duration) -> AutoSyncHandle {
    let (triggers, rx) = mpsc::channel(TRIGGER_QUEUE);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(engine, interval, rx, shutdown_rx));
    AutoSyncHandle {
        triggers,
        shutdown: Some(shutdown_tx),
        task,
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    interval: Duration,
    mut triggers: mpsc::Receiver<SyncTrigger>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; start counting from now.
    ticker.tick().await;

    let mut connectivity = engine.notifier().subscribe();
    let mut last_online = connectivity.borrow_and_update().is_online();
    let mut watching = true;

    tracing::info!(interval_ms = interval.as_millis() as u64, "auto-sync started");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if engine.notifier().current().is_online() {
                    run_cycle(&engine, SyncTrigger::Timer).await;
                } else {
                    tracing::trace!("offline, timer tick skipped");
                }
            }
            changed = connectivity.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let online = connectivity.borrow_and_update().is_online();
                if online && !last_online {
                    run_cycle(&engine, SyncTrigger::Reconnect).await;
                }
                last_online = online;
            }
            trigger = triggers.recv() => match trigger {
                Some(trigger) => run_cycle(&engine, trigger).await,
                None => break,
            },
        }
    }
    tracing::info!("auto-sync stopped");
}

async fn run_cycle(engine: &SyncEngine, trigger: SyncTrigger) {
    match engine.sync(trigger).await {
        Ok(report) => tracing::debug!(
            trigger = trigger.as_str(),
            outcome = report.outcome.as_str(),
            "auto-sync cycle done"
        ),
        Err(e) => tracing::warn!(
            trigger = trigger.as_str(),
            error = %e,
            code = e.error_code(),
            "auto-sync cycle failed"
        ),
    }
}
