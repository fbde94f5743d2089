//! Test doubles: a scripted in-memory remote and engine wiring helpers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use tether_core::errors::{RemoteError, TetherResult};
use tether_core::models::{OperationKind, Payload};
use tether_core::traits::{Connectivity, ManualClock, WatchNotifier};
use tether_core::TetherConfig;
use tether_storage::MemoryKv;
use tether_sync::transport::{PullResponse, PushRequest, RegisterDeviceRequest};
use tether_sync::{EngineDeps, PushAck, RemoteApi, SyncEngine};

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

/// Forced answer for the next push.
#[derive(Debug, Clone)]
pub enum Scripted {
    Network,
    /// Apply the operation, then lose the response.
    AckLost,
    Reject(u16),
    Auth,
    Conflict(Option<Payload>),
    /// Never answer.
    Hang,
}

#[derive(Debug, Default)]
pub struct RemoteState {
    pub documents: BTreeMap<(String, String), Payload>,
    pub applied_ops: HashSet<String>,
    pub apply_count: usize,
    pub changes: BTreeMap<String, Vec<Value>>,
    pub push_script: VecDeque<Scripted>,
    pub heartbeat_script: VecDeque<RemoteError>,
    pub registrations: Vec<RegisterDeviceRequest>,
    pub heartbeats: usize,
    pub pushes: Vec<PushRequest>,
    pub pulls: Vec<(String, Option<DateTime<Utc>>)>,
    pub pull_script: VecDeque<RemoteError>,
}

/// In-memory remote that deduplicates by operation id.
#[derive(Default)]
pub struct ScriptedRemote {
    pub state: Mutex<RemoteState>,
    /// When set, every push waits for a permit after signalling `entered`.
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::default(),
            gate: Some((entered, release)),
        })
    }

    pub fn script_push(&self, answers: impl IntoIterator<Item = Scripted>) {
        self.state.lock().unwrap().push_script.extend(answers);
    }

    pub fn fail_heartbeat(&self, error: RemoteError) {
        self.state.lock().unwrap().heartbeat_script.push_back(error);
    }

    pub fn fail_pull(&self, error: RemoteError) {
        self.state.lock().unwrap().pull_script.push_back(error);
    }

    /// Publish a change the next pull returns.
    pub fn publish(&self, collection: &str, item: Value) {
        self.state
            .lock()
            .unwrap()
            .changes
            .entry(collection.to_string())
            .or_default()
            .push(item);
    }

    pub fn clear_changes(&self) {
        self.state.lock().unwrap().changes.clear();
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Payload> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().unwrap().pushes.len()
    }

    pub fn apply_count(&self) -> usize {
        self.state.lock().unwrap().apply_count
    }

    fn apply(state: &mut RemoteState, request: &PushRequest) {
        if !state.applied_ops.insert(request.operation_id.clone()) {
            return;
        }
        state.apply_count += 1;
        let key = (request.collection.clone(), request.document_id.clone());
        match request.kind {
            OperationKind::Create | OperationKind::Update => {
                let body = request.payload.clone().unwrap_or_default();
                state.documents.insert(key, body);
            }
            OperationKind::Delete => {
                state.documents.remove(&key);
            }
        }
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn register_device(&self, request: &RegisterDeviceRequest) -> TetherResult<()> {
        self.state
            .lock()
            .unwrap()
            .registrations
            .push(request.clone());
        Ok(())
    }

    async fn heartbeat(&self, _device_id: &str) -> TetherResult<()> {
        let mut state = self.state.lock().unwrap();
        state.heartbeats += 1;
        match state.heartbeat_script.pop_front() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    async fn pull_changes(
        &self,
        device_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> TetherResult<PullResponse> {
        let mut state = self.state.lock().unwrap();
        state.pulls.push((device_id.to_string(), since));
        if let Some(err) = state.pull_script.pop_front() {
            return Err(err.into());
        }
        Ok(PullResponse {
            changes: state.changes.clone(),
        })
    }

    async fn push_operation(&self, request: &PushRequest) -> TetherResult<PushAck> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.pushes.push(request.clone());
            state.push_script.pop_front()
        };
        let network = || RemoteError::Network {
            reason: "connection reset".into(),
        };
        match scripted {
            None => {
                Self::apply(&mut self.state.lock().unwrap(), request);
                Ok(PushAck::Accepted)
            }
            Some(Scripted::Network) => Err(network().into()),
            Some(Scripted::AckLost) => {
                Self::apply(&mut self.state.lock().unwrap(), request);
                Err(network().into())
            }
            Some(Scripted::Reject(status)) => Err(RemoteError::Rejected {
                status,
                reason: "invalid payload".into(),
            }
            .into()),
            Some(Scripted::Auth) => Err(RemoteError::Auth {
                reason: "token expired".into(),
            }
            .into()),
            Some(Scripted::Conflict(remote)) => Ok(PushAck::Conflict { remote }),
            Some(Scripted::Hang) => std::future::pending().await,
        }
    }
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub remote: Arc<ScriptedRemote>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<WatchNotifier>,
    pub kv: Arc<MemoryKv>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(TetherConfig::default(), ScriptedRemote::new(), Connectivity::Online)
}

pub fn harness_with(
    config: TetherConfig,
    remote: Arc<ScriptedRemote>,
    connectivity: Connectivity,
) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let notifier = Arc::new(WatchNotifier::new(connectivity));
    let kv = Arc::new(MemoryKv::new());
    let engine = SyncEngine::new(
        config,
        EngineDeps {
            kv: kv.clone(),
            remote: remote.clone(),
            clock: clock.clone(),
            notifier: notifier.clone(),
        },
    )
    .unwrap();
    Harness {
        engine: Arc::new(engine),
        remote,
        clock,
        notifier,
        kv,
    }
}
