/// Local persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("corrupt value at key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("no record {collection}/{id}")]
    RecordNotFound { collection: String, id: String },
}
