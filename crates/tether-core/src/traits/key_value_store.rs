use crate::errors::TetherResult;

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Put { key: String, value: String },
    Delete { key: String },
}

impl KvWrite {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }
}

/// Durable string key/value storage underneath the Local Store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> TetherResult<Option<String>>;

    /// Apply every write or none of them.
    fn apply(&self, writes: &[KvWrite]) -> TetherResult<()>;

    fn put(&self, key: &str, value: &str) -> TetherResult<()> {
        self.apply(&[KvWrite::put(key, value)])
    }

    fn delete(&self, key: &str) -> TetherResult<()> {
        self.apply(&[KvWrite::delete(key)])
    }
}
