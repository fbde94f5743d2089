//! Local Store: durable cache of entities with a dirty marker and a TTL.
//!
//! Reads never touch the network. A clean write never replaces a dirty
//! record; local intent stays authoritative until conflict resolution
//! says otherwise.

use std::sync::Arc;

use chrono::Duration;

use tether_core::errors::TetherResult;
use tether_core::models::{validate_collection, validate_document_id, CachedRecord, Payload};
use tether_core::traits::Clock;

use crate::txn::{StoreContext, Txn};

/// Result of a [`LocalStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// A clean write hit a dirty record and was not applied.
    HeldBack,
}

pub struct LocalStore {
    ctx: Arc<StoreContext>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl LocalStore {
    pub fn new(ctx: Arc<StoreContext>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { ctx, clock, ttl }
    }

    pub fn context(&self) -> &Arc<StoreContext> {
        &self.ctx
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn put(
        &self,
        collection: &str,
        id: &str,
        payload: Payload,
        dirty: bool,
    ) -> TetherResult<PutOutcome> {
        validate_collection(collection)?;
        validate_document_id(id)?;
        self.ctx
            .transaction(|txn| self.stage_put(txn, collection, id, payload, dirty))
    }

    /// Live record, or `None` when missing, tombstoned, or expired.
    /// Expired records are removed on the way out.
    pub fn get(&self, collection: &str, id: &str) -> TetherResult<Option<CachedRecord>> {
        let now = self.clock.now();
        self.ctx.transaction(|txn| {
            let Some(record) = self.read(txn, collection, id)? else {
                return Ok(None);
            };
            if record.is_expired(now, self.ttl) {
                self.stage_remove(txn, collection, id)?;
                return Ok(None);
            }
            Ok((!record.deleted).then_some(record))
        })
    }

    /// Live records in insertion order. Expired records are removed lazily.
    pub fn get_all(&self, collection: &str) -> TetherResult<Vec<CachedRecord>> {
        let now = self.clock.now();
        self.ctx.transaction(|txn| {
            let mut live = Vec::new();
            for record in self.read_all(txn, collection)? {
                if record.is_expired(now, self.ttl) {
                    self.stage_remove(txn, collection, &record.id)?;
                } else if !record.deleted {
                    live.push(record);
                }
            }
            Ok(live)
        })
    }

    /// Live records matching `predicate`.
    pub fn search<P>(&self, collection: &str, predicate: P) -> TetherResult<Vec<CachedRecord>>
    where
        P: Fn(&CachedRecord) -> bool,
    {
        Ok(self
            .get_all(collection)?
            .into_iter()
            .filter(|r| predicate(r))
            .collect())
    }

    /// Remove a record and its index entry, dirty or not.
    pub fn remove(&self, collection: &str, id: &str) -> TetherResult<bool> {
        self.ctx
            .transaction(|txn| self.stage_remove(txn, collection, id))
    }

    /// Every stored record of a collection, including tombstones and
    /// expired entries.
    pub fn entries(&self, collection: &str) -> TetherResult<Vec<CachedRecord>> {
        self.ctx.transaction(|txn| self.read_all(txn, collection))
    }

    /// Stored record without expiry or tombstone filtering.
    pub fn peek(&self, collection: &str, id: &str) -> TetherResult<Option<CachedRecord>> {
        self.ctx.transaction(|txn| self.read(txn, collection, id))
    }

    /// Collections that have held at least one record.
    pub fn collections(&self) -> TetherResult<Vec<String>> {
        self.ctx.transaction(|txn| read_collections(txn))
    }

    // --- Staged operations, for composing atomic updates ---

    pub fn read(
        &self,
        txn: &Txn<'_>,
        collection: &str,
        id: &str,
    ) -> TetherResult<Option<CachedRecord>> {
        txn.get_json(&txn.keys().record(collection, id))
    }

    pub fn read_all(&self, txn: &Txn<'_>, collection: &str) -> TetherResult<Vec<CachedRecord>> {
        let index: Vec<String> = txn.get_json(&txn.keys().index(collection))?.unwrap_or_default();
        let mut records = Vec::with_capacity(index.len());
        for id in &index {
            if let Some(record) = self.read(txn, collection, id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Write honoring the dirty-wins rule.
    pub fn stage_put(
        &self,
        txn: &mut Txn<'_>,
        collection: &str,
        id: &str,
        payload: Payload,
        dirty: bool,
    ) -> TetherResult<PutOutcome> {
        if !dirty {
            if let Some(existing) = self.read(txn, collection, id)? {
                if existing.dirty {
                    tracing::debug!(collection, id, "clean write held back by dirty record");
                    return Ok(PutOutcome::HeldBack);
                }
            }
        }
        let record = CachedRecord::new(collection, id, payload, dirty, self.clock.now());
        self.stage_write(txn, &record)?;
        Ok(PutOutcome::Written)
    }

    /// Write `record` as-is, maintaining the collection index.
    pub fn stage_write(&self, txn: &mut Txn<'_>, record: &CachedRecord) -> TetherResult<()> {
        let keys = txn.keys();
        let index_key = keys.index(&record.collection);
        let mut index: Vec<String> = txn.get_json(&index_key)?.unwrap_or_default();
        if !index.iter().any(|existing| existing == &record.id) {
            if index.is_empty() {
                let mut collections = read_collections(txn)?;
                if !collections.contains(&record.collection) {
                    collections.push(record.collection.clone());
                    txn.put_json(keys.collections(), &collections)?;
                }
            }
            index.push(record.id.clone());
            txn.put_json(index_key, &index)?;
        }
        txn.put_json(keys.record(&record.collection, &record.id), record)
    }

    pub fn stage_remove(&self, txn: &mut Txn<'_>, collection: &str, id: &str) -> TetherResult<bool> {
        let keys = txn.keys();
        let record_key = keys.record(collection, id);
        let existed = txn.get(&record_key)?.is_some();
        txn.delete(record_key);

        let index_key = keys.index(collection);
        let mut index: Vec<String> = txn.get_json(&index_key)?.unwrap_or_default();
        let before = index.len();
        index.retain(|existing| existing != id);
        if index.len() != before {
            txn.put_json(index_key, &index)?;
        }
        Ok(existed)
    }

    /// Clear the dirty marker, keeping the payload.
    pub fn stage_mark_clean(&self, txn: &mut Txn<'_>, collection: &str, id: &str) -> TetherResult<bool> {
        match self.read(txn, collection, id)? {
            Some(mut record) if record.dirty => {
                record.dirty = false;
                self.stage_write(txn, &record)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replace the payload regardless of the dirty marker.
    pub fn stage_overwrite(
        &self,
        txn: &mut Txn<'_>,
        collection: &str,
        id: &str,
        payload: Payload,
        dirty: bool,
    ) -> TetherResult<()> {
        let record = CachedRecord::new(collection, id, payload, dirty, self.clock.now());
        self.stage_write(txn, &record)
    }

    /// Turn the record into a dirty tombstone awaiting delete acknowledgment.
    pub fn stage_tombstone(&self, txn: &mut Txn<'_>, collection: &str, id: &str) -> TetherResult<bool> {
        let Some(mut record) = self.read(txn, collection, id)? else {
            return Ok(false);
        };
        record.deleted = true;
        record.dirty = true;
        record.last_modified = self.clock.now();
        self.stage_write(txn, &record)?;
        Ok(true)
    }
}

fn read_collections(txn: &Txn<'_>) -> TetherResult<Vec<String>> {
    Ok(txn
        .get_json(&txn.keys().collections())?
        .unwrap_or_default())
}
