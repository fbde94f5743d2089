//! SyncEngine: the application-facing object. Owns the Local Store, the
//! Operation Log, conflict state, and the coordinator, all built from
//! injected dependencies.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use tether_core::errors::{StorageError, TetherResult, ValidationError};
use tether_core::models::{
    payload_from_value, validate_collection, validate_document_id, CachedRecord, ConflictCase,
    FailedOperation, OperationKind, PendingOperation, SyncState, SyncStatus,
};
use tether_core::traits::{Clock, ConnectivityNotifier, KeyValueStore, SystemClock};
use tether_core::TetherConfig;
use tether_storage::operation_log;
use tether_storage::{
    CacheGovernor, CleanupReport, KeySpace, LocalStore, OperationLog, SqliteKv, StoreContext,
    SyncMetadata,
};

use crate::conflict::{apply_resolution, ConflictRecord, ConflictResolver, Resolution, ResolutionEffect};
use crate::device::DeviceRegistry;
use crate::scheduler::{self, AutoSyncHandle};
use crate::sync::{lock_conflicts, CycleOutcome, SyncCoordinator, SyncReport, SyncSettings, SyncTrigger};
use crate::transport::{HttpClient, HttpClientConfig, RemoteApi};
use crate::typed::TypedCollection;

/// Capabilities the engine is built from.
pub struct EngineDeps {
    pub kv: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteApi>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn ConnectivityNotifier>,
}

pub struct SyncEngine {
    config: TetherConfig,
    store: Arc<LocalStore>,
    log: Arc<OperationLog>,
    metadata: Arc<SyncMetadata>,
    governor: Arc<CacheGovernor>,
    registry: Arc<DeviceRegistry>,
    conflicts: Arc<Mutex<ConflictResolver>>,
    coordinator: SyncCoordinator,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn ConnectivityNotifier>,
    in_progress: AtomicBool,
    /// Cleared when the remote stops answering, set again on the next
    /// successful contact.
    reachable: AtomicBool,
}

/// Resets the in-flight flag however the cycle ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    pub fn new(config: TetherConfig, deps: EngineDeps) -> TetherResult<Self> {
        config.validate()?;
        let EngineDeps {
            kv,
            remote,
            clock,
            notifier,
        } = deps;

        let ctx = Arc::new(StoreContext::new(
            kv,
            KeySpace::new(config.storage.key_prefix.clone()),
        ));
        let store = Arc::new(LocalStore::new(
            ctx.clone(),
            clock.clone(),
            config.cache.expiry(),
        ));
        let log = Arc::new(OperationLog::new(ctx.clone()));
        let metadata = Arc::new(SyncMetadata::new(ctx));
        let governor = Arc::new(CacheGovernor::new(
            store.clone(),
            clock.clone(),
            config.cache.max_cache_size,
        ));
        let timeout = Duration::from_millis(config.sync.request_timeout_ms);
        let registry = Arc::new(DeviceRegistry::new(
            metadata.clone(),
            remote.clone(),
            config.device.clone(),
            config.sync.user_id.clone(),
            timeout,
        ));
        let conflicts = Arc::new(Mutex::new(ConflictResolver::new(
            config.cache.ignore_fields.clone(),
        )));
        let coordinator = SyncCoordinator::new(
            store.clone(),
            log.clone(),
            metadata.clone(),
            governor.clone(),
            registry.clone(),
            remote,
            clock.clone(),
            conflicts.clone(),
            SyncSettings {
                max_retries: config.sync.max_retries,
                id_field: config.sync.id_field.clone(),
                request_timeout: timeout,
            },
        );

        Ok(Self {
            config,
            store,
            log,
            metadata,
            governor,
            registry,
            conflicts,
            coordinator,
            clock,
            notifier,
            in_progress: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
        })
    }

    /// Production wiring: SQLite at `storage.db_path`, the HTTP client, and
    /// the system clock.
    pub fn open(config: TetherConfig, notifier: Arc<dyn ConnectivityNotifier>) -> TetherResult<Self> {
        let kv = Arc::new(SqliteKv::open(Path::new(&config.storage.db_path))?);
        let remote = Arc::new(HttpClient::new(HttpClientConfig::from_sync_config(
            &config.sync,
        ))?);
        Self::new(
            config,
            EngineDeps {
                kv,
                remote,
                clock: Arc::new(SystemClock),
                notifier,
            },
        )
    }

    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Arc<dyn ConnectivityNotifier> {
        &self.notifier
    }

    /// Create the device identity and try to register it. Registration
    /// failure is logged and retried by the next cycle.
    pub async fn init(&self) -> TetherResult<SyncState> {
        let device_id = self.registry.device_id()?;
        if self.notifier.current().is_online() {
            match self.registry.ensure_registered().await {
                Ok(_) => self.reachable.store(true, Ordering::Release),
                Err(e) => {
                    if e.is_transient() {
                        self.reachable.store(false, Ordering::Release);
                    }
                    tracing::warn!(device_id = %device_id, error = %e, "device registration deferred");
                }
            }
        }
        self.state()
    }

    // --- Mutations ---

    /// Store a new record dirty and queue its create. The id comes from the
    /// payload's id field, or is generated and written into it.
    pub fn create(&self, collection: &str, payload: Value) -> TetherResult<CachedRecord> {
        validate_collection(collection)?;
        let id_field = self.config.sync.id_field.as_str();
        let mut payload = payload_from_value(collection, "<new>", payload)?;
        let id = match payload.get(id_field) {
            Some(Value::String(id)) => id.clone(),
            Some(_) => {
                return Err(ValidationError::MissingIdField {
                    field: id_field.to_string(),
                }
                .into())
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                payload.insert(id_field.to_string(), Value::String(id.clone()));
                id
            }
        };
        validate_document_id(&id)?;
        self.write_with_operation(OperationKind::Create, collection, &id, payload)
    }

    /// Shallow-merge `changes` into a live record and queue the update.
    pub fn update(&self, collection: &str, id: &str, changes: Value) -> TetherResult<CachedRecord> {
        validate_collection(collection)?;
        validate_document_id(id)?;
        let changes = payload_from_value(collection, id, changes)?;
        let id_field = self.config.sync.id_field.as_str();
        if let Some(new_id) = changes.get(id_field) {
            if new_id.as_str() != Some(id) {
                return Err(ValidationError::InvalidIdentifier {
                    field: "id",
                    value: new_id.to_string(),
                    reason: format!("{id_field} cannot change on update"),
                }
                .into());
            }
        }
        let Some(current) = self.store.get(collection, id)? else {
            return Err(not_found(collection, id));
        };
        let mut payload = current.payload;
        payload.extend(changes);
        self.write_with_operation(OperationKind::Update, collection, id, payload)
    }

    /// Hide the record locally and queue its delete. The record is removed
    /// once the remote acknowledges.
    pub fn delete(&self, collection: &str, id: &str) -> TetherResult<()> {
        validate_collection(collection)?;
        validate_document_id(id)?;
        let now = self.clock.now();
        let store = &self.store;
        store.context().transaction(|txn| {
            let live = store.read(txn, collection, id)?.filter(|r| !r.deleted);
            if live.is_none() {
                return Err(not_found(collection, id));
            }
            store.stage_tombstone(txn, collection, id)?;
            operation_log::stage_enqueue(
                txn,
                PendingOperation::new(OperationKind::Delete, collection, id, None, now),
            )
        })
    }

    fn write_with_operation(
        &self,
        kind: OperationKind,
        collection: &str,
        id: &str,
        payload: tether_core::models::Payload,
    ) -> TetherResult<CachedRecord> {
        let now = self.clock.now();
        let store = &self.store;
        store.context().transaction(|txn| {
            let record = CachedRecord::new(collection, id, payload.clone(), true, now);
            store.stage_write(txn, &record)?;
            operation_log::stage_enqueue(
                txn,
                PendingOperation::new(kind, collection, id, Some(payload), now),
            )?;
            Ok(record)
        })
    }

    // --- Reads ---

    pub fn get(&self, collection: &str, id: &str) -> TetherResult<Option<CachedRecord>> {
        self.store.get(collection, id)
    }

    pub fn get_all(&self, collection: &str) -> TetherResult<Vec<CachedRecord>> {
        self.store.get_all(collection)
    }

    pub fn search<P>(&self, collection: &str, predicate: P) -> TetherResult<Vec<CachedRecord>>
    where
        P: Fn(&CachedRecord) -> bool,
    {
        self.store.search(collection, predicate)
    }

    /// Typed handle over one collection.
    pub fn collection<T>(&self, name: impl Into<String>) -> TypedCollection<'_, T> {
        TypedCollection::new(self, name.into())
    }

    // --- Sync ---

    /// Run a cycle unless one is already in flight, in which case the
    /// current state comes back as a no-op report.
    pub async fn sync(&self, trigger: SyncTrigger) -> TetherResult<SyncReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(trigger = trigger.as_str(), "cycle in flight, trigger coalesced");
            let mut report = SyncReport::with_outcome(CycleOutcome::AlreadyRunning);
            report.state = self.state()?;
            return Ok(report);
        }
        let guard = InFlight(&self.in_progress);

        if !self.notifier.current().is_online() {
            let mut report = SyncReport::with_outcome(CycleOutcome::Offline);
            report.state = self.state()?;
            return Ok(report);
        }

        let mut report = self.coordinator.run_cycle(trigger).await?;
        self.reachable
            .store(report.outcome != CycleOutcome::Offline, Ordering::Release);
        drop(guard);
        report.state = self.state()?;
        Ok(report)
    }

    /// Start the auto-sync task at the configured interval.
    pub fn start_auto_sync(self: &Arc<Self>) -> AutoSyncHandle {
        let interval = Duration::from_millis(self.config.sync.auto_sync_interval_ms);
        scheduler::spawn(self.clone(), interval)
    }

    /// Settle an open conflict case.
    pub fn resolve_conflict(
        &self,
        collection: &str,
        id: &str,
        resolution: Resolution,
    ) -> TetherResult<ResolutionEffect> {
        let now = self.clock.now();
        let mut conflicts = lock_conflicts(&self.conflicts)?;
        let Some(case) = conflicts.get(collection, id).cloned() else {
            return Err(tether_core::errors::ConflictError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        };
        let effect = apply_resolution(
            &self.store,
            &case,
            &resolution,
            conflicts.ignore_fields(),
            now,
        )?;
        match &effect {
            ResolutionEffect::Closed => {
                conflicts.close(collection, id, resolution.strategy(), now);
            }
            ResolutionEffect::StillOpen {
                local_payload,
                conflicted_fields,
            } => {
                conflicts.reopen_with(
                    collection,
                    id,
                    local_payload.clone(),
                    conflicted_fields.clone(),
                );
            }
        }
        Ok(effect)
    }

    pub fn unresolved_conflicts(&self) -> TetherResult<Vec<ConflictCase>> {
        Ok(lock_conflicts(&self.conflicts)?.unresolved())
    }

    pub fn conflict_history(&self) -> TetherResult<Vec<ConflictRecord>> {
        Ok(lock_conflicts(&self.conflicts)?.log().records().to_vec())
    }

    // --- Failed operations ---

    pub fn pending_operations(&self) -> TetherResult<Vec<PendingOperation>> {
        self.log.pending()
    }

    pub fn failed_operations(&self) -> TetherResult<Vec<FailedOperation>> {
        self.log.failed()
    }

    /// Put a failed operation back in the queue with a fresh retry budget.
    ///
    /// The queued operation is rebuilt from the record as it stands now, so
    /// later local edits are what gets pushed. Returns `false` when the
    /// record is already clean or gone; the failed entry is then left for
    /// [`discard_failed`](Self::discard_failed).
    pub fn retry_failed(&self, op_id: &str) -> TetherResult<bool> {
        let now = self.clock.now();
        let store = &self.store;
        self.log.retry_failed(op_id, |txn, failed| {
            let Some(record) = store.read(txn, &failed.collection, &failed.document_id)? else {
                return Ok(None);
            };
            if !record.dirty {
                return Ok(None);
            }
            let (kind, payload) = if record.deleted {
                (OperationKind::Delete, None)
            } else if failed.kind == OperationKind::Delete {
                (OperationKind::Update, Some(record.payload))
            } else {
                (failed.kind, Some(record.payload))
            };
            // Fresh id: the remote may already hold the old one's outcome.
            let mut operation =
                PendingOperation::new(kind, &record.collection, &record.id, payload, now);
            operation.overwrite = failed.overwrite;
            Ok(Some(operation))
        })
    }

    /// Forget a failed operation. The record it touched stays dirty local
    /// state until the caller overwrites or resyncs it.
    pub fn discard_failed(&self, op_id: &str) -> TetherResult<Option<FailedOperation>> {
        self.log.discard_failed(op_id)
    }

    /// Run the cache governor over every collection outside a cycle.
    pub fn cleanup_cache(&self) -> TetherResult<CleanupReport> {
        self.governor.cleanup_all()
    }

    // --- Status ---

    pub fn is_online(&self) -> bool {
        self.notifier.current().is_online() && self.reachable.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TetherResult<SyncState> {
        Ok(SyncState {
            device_id: self.metadata.device_id()?,
            last_sync_time: self.metadata.last_sync()?,
            online: self.is_online(),
            sync_in_progress: self.in_progress.load(Ordering::Acquire),
            pending_count: self.log.len()?,
        })
    }

    pub fn status(&self) -> TetherResult<SyncStatus> {
        Ok(SyncStatus {
            online: self.is_online(),
            pending_operations: self.log.len()?,
            failed_operations: self.log.failed()?.len(),
            unresolved_conflicts: lock_conflicts(&self.conflicts)?.len(),
            sync_in_progress: self.in_progress.load(Ordering::Acquire),
            last_sync_time: self.metadata.last_sync()?,
        })
    }
}

fn not_found(collection: &str, id: &str) -> tether_core::TetherError {
    StorageError::RecordNotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
    .into()
}
