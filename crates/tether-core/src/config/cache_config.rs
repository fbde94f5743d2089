use serde::{Deserialize, Serialize};

use super::defaults;

/// Local Store bounds enforced by the cache governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Non-dirty entries older than this are expired (`cacheExpiryHours`).
    pub cache_expiry_hours: u64,
    /// Soft cap on entries per collection (`maxCacheSize`).
    pub max_cache_size: usize,
    /// Top-level payload fields left out of conflict comparison.
    pub ignore_fields: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_expiry_hours: defaults::DEFAULT_CACHE_EXPIRY_HOURS,
            max_cache_size: defaults::DEFAULT_MAX_CACHE_SIZE,
            ignore_fields: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_expiry_hours as i64)
    }
}
