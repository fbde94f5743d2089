//! Cache governor: TTL expiry followed by capacity eviction.
//!
//! Dirty records are never expired or evicted and do not count toward the
//! eviction quota, so dirty entries can keep a collection above the cap.

use std::sync::Arc;

use tether_core::errors::TetherResult;
use tether_core::observability::events;
use tether_core::traits::Clock;

use crate::local_store::LocalStore;

/// Counts from one cleanup pass over a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: usize,
    pub evicted: usize,
    pub remaining: usize,
}

impl CleanupReport {
    fn absorb(&mut self, other: CleanupReport) {
        self.expired += other.expired;
        self.evicted += other.evicted;
        self.remaining += other.remaining;
    }
}

pub struct CacheGovernor {
    store: Arc<LocalStore>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl CacheGovernor {
    pub fn new(store: Arc<LocalStore>, clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            store,
            clock,
            max_entries,
        }
    }

    /// Expire stale clean records. If the collection still exceeds the cap,
    /// evict the oldest clean records down to `max` clean entries.
    pub fn cleanup(&self, collection: &str) -> TetherResult<CleanupReport> {
        let _span = tracing::debug_span!(
            tether_core::observability::names::CACHE_CLEANUP,
            collection
        )
        .entered();
        let now = self.clock.now();
        let ttl = self.store.ttl();
        let max = self.max_entries;

        let report = self.store.context().transaction(|txn| {
            let mut report = CleanupReport::default();
            let mut survivors = Vec::new();
            for record in self.store.read_all(txn, collection)? {
                if record.is_expired(now, ttl) {
                    self.store.stage_remove(txn, collection, &record.id)?;
                    report.expired += 1;
                } else {
                    survivors.push(record);
                }
            }

            if survivors.len() > max {
                let mut clean: Vec<_> = survivors.iter().filter(|r| !r.dirty).collect();
                clean.sort_by(|a, b| {
                    a.last_modified
                        .cmp(&b.last_modified)
                        .then_with(|| a.id.cmp(&b.id))
                });
                let excess = clean.len().saturating_sub(max);
                for record in clean.into_iter().take(excess) {
                    self.store.stage_remove(txn, collection, &record.id)?;
                    report.evicted += 1;
                }
            }
            report.remaining = survivors.len() - report.evicted;
            Ok(report)
        })?;

        if report.expired > 0 || report.evicted > 0 {
            events::cache_cleaned(collection, report.expired, report.evicted, report.remaining);
        }
        Ok(report)
    }

    /// Clean every known collection and sum the results.
    pub fn cleanup_all(&self) -> TetherResult<CleanupReport> {
        let mut total = CleanupReport::default();
        for collection in self.store.collections()? {
            total.absorb(self.cleanup(&collection)?);
        }
        Ok(total)
    }
}
