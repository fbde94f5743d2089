use serde::{Deserialize, Serialize};

use super::defaults;

/// Local persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Prefix of every persisted key (`prefix:` in the key layout).
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::DEFAULT_DB_FILENAME.to_string(),
            key_prefix: defaults::DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}
