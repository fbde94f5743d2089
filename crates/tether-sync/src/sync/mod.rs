//! Sync Coordinator: one full cycle of liveness, drain, pull, reconcile,
//! and watermark update.

pub mod pull;
pub mod push;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;

use tether_core::errors::{ErrorKind, StorageError, TetherError, TetherResult};
use tether_core::models::{FailedOperation, SyncState};
use tether_core::observability::{events, names};
use tether_core::traits::Clock;
use tether_storage::{CacheGovernor, CleanupReport, LocalStore, OperationLog, SyncMetadata};

use crate::conflict::{ConflictResolver, ResolutionStrategy};
use crate::device::DeviceRegistry;
use crate::transport::{with_timeout, RemoteApi};

pub use pull::PullResult;
pub use push::PushResult;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Timer,
    Reconnect,
    Foreground,
    Manual,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Reconnect => "reconnect",
            Self::Foreground => "foreground",
            Self::Manual => "manual",
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Watermark advanced.
    #[default]
    Completed,
    /// Ran to the end with open conflicts; the watermark did not move.
    Conflicted,
    /// The remote was unreachable; nothing after that point ran.
    Offline,
    /// Another cycle was in flight; this trigger was a no-op.
    AlreadyRunning,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Conflicted => "conflicted",
            Self::Offline => "offline",
            Self::AlreadyRunning => "already_running",
        }
    }
}

/// Summary of one cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcome: CycleOutcome,
    /// Operations the remote acknowledged.
    pub pushed: usize,
    /// Operations that failed, whether kept for retry or dropped.
    pub failed: usize,
    /// Operations not attempted: parked collection or open conflict.
    pub skipped: usize,
    /// Pushes answered with a conflict indication; they stay queued.
    pub push_conflicts: usize,
    /// Items received from the pull.
    pub pulled: usize,
    /// Pulled items written to, or deleted from, the Local Store.
    pub applied: usize,
    /// Pulled items that already matched a dirty local record.
    pub converged: usize,
    /// Pulled items without a usable collection, id or object body.
    pub ignored: usize,
    /// Open conflict cases when the cycle ended.
    pub conflicts: usize,
    /// Operations that left the queue for the failed list this cycle.
    pub dropped: Vec<FailedOperation>,
    pub cleanup: CleanupReport,
    /// Engine state after the cycle.
    pub state: SyncState,
}

impl SyncReport {
    pub fn with_outcome(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Failures after which an operation leaves the queue.
    pub max_retries: u32,
    /// Payload field that carries the document id.
    pub id_field: String,
    /// Limit applied to every remote call.
    pub request_timeout: Duration,
}

/// Runs cycles over the shared store, log and conflict state. The engine
/// makes sure only one cycle is in flight.
pub struct SyncCoordinator {
    pub(crate) store: Arc<LocalStore>,
    pub(crate) log: Arc<OperationLog>,
    pub(crate) metadata: Arc<SyncMetadata>,
    pub(crate) governor: Arc<CacheGovernor>,
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) remote: Arc<dyn RemoteApi>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) conflicts: Arc<Mutex<ConflictResolver>>,
    pub(crate) settings: SyncSettings,
}

impl SyncCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<LocalStore>,
        log: Arc<OperationLog>,
        metadata: Arc<SyncMetadata>,
        governor: Arc<CacheGovernor>,
        registry: Arc<DeviceRegistry>,
        remote: Arc<dyn RemoteApi>,
        clock: Arc<dyn Clock>,
        conflicts: Arc<Mutex<ConflictResolver>>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            log,
            metadata,
            governor,
            registry,
            remote,
            clock,
            conflicts,
            settings,
        }
    }

    pub(crate) fn conflicts(&self) -> TetherResult<MutexGuard<'_, ConflictResolver>> {
        lock_conflicts(&self.conflicts)
    }

    pub(crate) fn has_open_conflict(&self, collection: &str, id: &str) -> TetherResult<bool> {
        Ok(self.conflicts()?.contains(collection, id))
    }

    pub(crate) fn close_conflict(
        &self,
        collection: &str,
        id: &str,
        strategy: ResolutionStrategy,
    ) -> TetherResult<()> {
        let now = self.clock.now();
        self.conflicts()?.close(collection, id, strategy, now);
        Ok(())
    }

    /// Run one cycle. Auth and storage failures abort it with an error;
    /// an unreachable remote ends it early as [`CycleOutcome::Offline`].
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> TetherResult<SyncReport> {
        let span = tracing::info_span!(names::SYNC_CYCLE, trigger = trigger.as_str());
        async move {
            let result = self.cycle().await;
            match &result {
                Ok(report) => events::cycle_finished(
                    report.outcome.as_str(),
                    report.pushed,
                    report.pulled,
                    report.conflicts,
                ),
                Err(e) => tracing::warn!(error = %e, code = e.error_code(), "sync cycle aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn cycle(&self) -> TetherResult<SyncReport> {
        let mut report = SyncReport::default();

        // 1. Device liveness.
        let device_id = match self.registry.refresh_liveness().await {
            Ok(id) => id,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "remote unreachable, cycle ends offline");
                return Ok(SyncReport::with_outcome(CycleOutcome::Offline));
            }
            Err(e) if e.kind() == ErrorKind::Validation => {
                tracing::warn!(error = %e, "device liveness rejected, continuing");
                self.registry.device_id()?
            }
            Err(e) => return Err(e),
        };

        // 2. Drain.
        let pushed = push::drain_pending(self, &device_id)
            .instrument(tracing::debug_span!(names::DRAIN))
            .await?;
        report.pushed = pushed.pushed;
        report.failed = pushed.failed;
        report.skipped = pushed.skipped;
        report.push_conflicts = pushed.conflicts;
        report.dropped = pushed.dropped;

        // 3. Pull since the last watermark. The next watermark is taken
        // before the request leaves.
        let since = self.metadata.last_sync()?;
        let watermark = self.clock.now();
        let response = match with_timeout(
            self.settings.request_timeout,
            self.remote.pull_changes(&device_id, since),
        )
        .instrument(tracing::debug_span!(names::PULL))
        .await
        {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "pull failed, cycle ends offline");
                report.outcome = CycleOutcome::Offline;
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        // 4-5. Detect conflicts and apply what is not contested.
        let pulled = pull::apply_changes(self, response)?;
        report.pulled = pulled.pulled;
        report.applied = pulled.applied;
        report.converged = pulled.converged;
        report.ignored = pulled.ignored;

        report.cleanup = self.governor.cleanup_all()?;

        // 6. Watermark only moves with nothing left unresolved.
        report.conflicts = self.conflicts()?.len();
        if report.conflicts == 0 {
            self.metadata.set_last_sync(watermark)?;
            report.outcome = CycleOutcome::Completed;
        } else {
            report.outcome = CycleOutcome::Conflicted;
        }
        Ok(report)
    }
}

pub(crate) fn lock_conflicts(
    conflicts: &Mutex<ConflictResolver>,
) -> TetherResult<MutexGuard<'_, ConflictResolver>> {
    conflicts.lock().map_err(|_| -> TetherError {
        StorageError::LockPoisoned {
            resource: "conflict resolver".to_string(),
        }
        .into()
    })
}
