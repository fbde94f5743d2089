//! In-memory backend for tests and ephemeral sessions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tether_core::errors::TetherResult;
use tether_core::traits::{KeyValueStore, KvWrite};

use crate::lock_err;

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> TetherResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| lock_err("memory kv"))?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, writes: &[KvWrite]) -> TetherResult<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_err("memory kv"))?;
        for write in writes {
            match write {
                KvWrite::Put { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                KvWrite::Delete { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}
