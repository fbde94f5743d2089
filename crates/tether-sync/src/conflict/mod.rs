//! Conflict detection, resolution, and logging.

pub mod conflict_log;
pub mod detection;
pub mod resolution;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use tether_core::models::{ConflictCase, ConflictKey, Payload};
use tether_core::observability::events;

use conflict_log::ConflictLog;

pub use conflict_log::ConflictRecord;
pub use detection::{conflicted_fields, detect, is_remote_deletion};
pub use resolution::{
    apply_resolution, merge_payload, FieldChoice, MergeResolution, Resolution, ResolutionEffect,
    ResolutionStrategy,
};

/// Open conflict cases plus the log of everything detected so far.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    open: BTreeMap<ConflictKey, ConflictCase>,
    log: ConflictLog,
    ignore_fields: Vec<String>,
}

impl ConflictResolver {
    pub fn new(ignore_fields: Vec<String>) -> Self {
        Self {
            open: BTreeMap::new(),
            log: ConflictLog::new(),
            ignore_fields,
        }
    }

    pub fn ignore_fields(&self) -> &[String] {
        &self.ignore_fields
    }

    /// Open a case. A case already open for the document is refreshed in
    /// place and keeps its log record.
    pub fn open(&mut self, case: ConflictCase) {
        match self.open.get_mut(&case.key()) {
            Some(existing) => {
                self.log.record_refreshed(&case);
                existing.local_payload = case.local_payload;
                existing.remote_payload = case.remote_payload;
                existing.conflicted_fields = case.conflicted_fields;
            }
            None => {
                events::conflict_detected(&case.collection, &case.id, &case.conflicted_fields);
                self.log.record_detected(&case);
                self.open.insert(case.key(), case);
            }
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&ConflictCase> {
        self.open.get(&(collection.to_string(), id.to_string()))
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.get(collection, id).is_some()
    }

    pub fn close(
        &mut self,
        collection: &str,
        id: &str,
        strategy: ResolutionStrategy,
        at: DateTime<Utc>,
    ) -> Option<ConflictCase> {
        let case = self.open.remove(&(collection.to_string(), id.to_string()))?;
        self.log.record_resolved(collection, id, strategy, at);
        events::conflict_resolved(collection, id, strategy.as_str());
        Some(case)
    }

    /// Keep a case open after a partial merge.
    pub fn reopen_with(&mut self, collection: &str, id: &str, local: Payload, fields: Vec<String>) {
        if let Some(case) = self.open.get_mut(&(collection.to_string(), id.to_string())) {
            case.local_payload = local;
            case.conflicted_fields = fields;
        }
    }

    /// Open cases ordered by collection, then id.
    pub fn unresolved(&self) -> Vec<ConflictCase> {
        self.open.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn log(&self) -> &ConflictLog {
        &self.log
    }
}
