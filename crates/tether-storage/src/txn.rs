//! Store context and the staged-write overlay used for atomic updates.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use tether_core::errors::{StorageError, TetherResult};
use tether_core::traits::{KeyValueStore, KvWrite};

use crate::keys::KeySpace;
use crate::lock_err;

/// Shared handle to the backend, the key layout, and the store lock.
pub struct StoreContext {
    kv: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    lock: Mutex<()>,
}

impl StoreContext {
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: KeySpace) -> Self {
        Self {
            kv,
            keys,
            lock: Mutex::new(()),
        }
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Run `f` under the store lock and commit its staged writes as one batch.
    ///
    /// Nothing is written when `f` fails.
    pub fn transaction<T, F>(&self, f: F) -> TetherResult<T>
    where
        F: FnOnce(&mut Txn<'_>) -> TetherResult<T>,
    {
        let _guard = self.lock.lock().map_err(|_| lock_err("store lock"))?;
        let mut txn = Txn {
            kv: self.kv.as_ref(),
            keys: &self.keys,
            staged: BTreeMap::new(),
        };
        let out = f(&mut txn)?;
        let writes = txn.into_writes();
        self.kv.apply(&writes)?;
        Ok(out)
    }
}

/// Read-your-writes overlay over the backend. Reads see staged writes first.
pub struct Txn<'a> {
    kv: &'a dyn KeyValueStore,
    keys: &'a KeySpace,
    staged: BTreeMap<String, Option<String>>,
}

impl<'a> Txn<'a> {
    pub fn keys(&self) -> &'a KeySpace {
        self.keys
    }

    pub fn get(&self, key: &str) -> TetherResult<Option<String>> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.kv.get(key),
        }
    }

    pub fn put(&mut self, key: String, value: String) {
        self.staged.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: String) {
        self.staged.insert(key, None);
    }

    /// Decode a JSON value. Undecodable data is reported as corruption.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> TetherResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&mut self, key: String, value: &T) -> TetherResult<()> {
        let raw = serde_json::to_string(value)?;
        self.put(key, raw);
        Ok(())
    }

    fn into_writes(self) -> Vec<KvWrite> {
        self.staged
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => KvWrite::Put { key, value },
                None => KvWrite::Delete { key },
            })
            .collect()
    }
}
