//! Conflict log: every detected conflict and how it was settled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tether_core::models::ConflictCase;

use super::resolution::ResolutionStrategy;

/// Resolved records kept before the oldest are discarded.
pub const MAX_RESOLVED_RECORDS: usize = 1024;

/// One conflict, from detection to resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Collection of the contested document.
    pub collection: String,
    /// Id of the contested document.
    pub document_id: String,
    /// Fields in conflict as last detected.
    pub conflicted_fields: Vec<String>,
    /// When the conflict was first seen.
    pub detected_at: DateTime<Utc>,
    /// `None` while the case is open.
    pub resolved_at: Option<DateTime<Utc>>,
    /// How it was settled, once it is.
    pub strategy: Option<ResolutionStrategy>,
}

impl ConflictRecord {
    fn is_open_for(&self, collection: &str, document_id: &str) -> bool {
        self.resolved_at.is_none() && self.collection == collection && self.document_id == document_id
    }
}

/// In-memory; it does not survive a restart. At most one record per
/// document is open at a time.
#[derive(Debug, Default)]
pub struct ConflictLog {
    records: Vec<ConflictRecord>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detected(&mut self, case: &ConflictCase) {
        if self.record_refreshed(case) {
            return;
        }
        self.records.push(ConflictRecord {
            collection: case.collection.clone(),
            document_id: case.id.clone(),
            conflicted_fields: case.conflicted_fields.clone(),
            detected_at: case.detected_at,
            resolved_at: None,
            strategy: None,
        });
    }

    /// Update the open record for a re-detected case. Returns `false` when
    /// there is none.
    pub fn record_refreshed(&mut self, case: &ConflictCase) -> bool {
        match self
            .records
            .iter_mut()
            .find(|r| r.is_open_for(&case.collection, &case.id))
        {
            Some(record) => {
                record.conflicted_fields = case.conflicted_fields.clone();
                true
            }
            None => false,
        }
    }

    /// Close the open record for the document.
    pub fn record_resolved(
        &mut self,
        collection: &str,
        document_id: &str,
        strategy: ResolutionStrategy,
        at: DateTime<Utc>,
    ) {
        for record in self
            .records
            .iter_mut()
            .filter(|r| r.is_open_for(collection, document_id))
        {
            record.resolved_at = Some(at);
            record.strategy = Some(strategy);
        }
        self.trim();
    }

    pub fn records(&self) -> &[ConflictRecord] {
        &self.records
    }

    fn trim(&mut self) {
        let resolved = self
            .records
            .iter()
            .filter(|r| r.resolved_at.is_some())
            .count();
        let mut excess = resolved.saturating_sub(MAX_RESOLVED_RECORDS);
        self.records.retain(|r| {
            if excess > 0 && r.resolved_at.is_some() {
                excess -= 1;
                return false;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn case(id: &str, fields: &[&str]) -> ConflictCase {
        ConflictCase {
            id: id.to_string(),
            collection: "goals".to_string(),
            local_payload: Default::default(),
            remote_payload: Default::default(),
            conflicted_fields: fields.iter().map(|f| f.to_string()).collect(),
            detected_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn redetection_updates_the_open_record() {
        let mut log = ConflictLog::new();
        log.record_detected(&case("g1", &["a"]));
        log.record_detected(&case("g1", &["a", "b"]));
        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].conflicted_fields, vec!["a", "b"]);

        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        log.record_resolved("goals", "g1", ResolutionStrategy::Remote, at);
        log.record_detected(&case("g1", &["c"]));
        assert_eq!(log.records().len(), 2);
    }

    #[test]
    fn resolved_records_are_bounded() {
        let mut log = ConflictLog::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        for i in 0..MAX_RESOLVED_RECORDS + 10 {
            let id = format!("g{i}");
            log.record_detected(&case(&id, &["a"]));
            log.record_resolved("goals", &id, ResolutionStrategy::Local, at);
        }
        log.record_detected(&case("open", &["a"]));
        assert_eq!(log.records().len(), MAX_RESOLVED_RECORDS + 1);
        assert_eq!(log.records()[0].document_id, "g10");
        assert!(log.records().last().unwrap().resolved_at.is_none());
    }
}
