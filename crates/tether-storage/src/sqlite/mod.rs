//! SQLite backend: one `kv` table behind a single serialized connection.

pub mod migrations;
pub mod pragmas;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use tether_core::errors::TetherResult;
use tether_core::traits::{KeyValueStore, KvWrite};

use crate::{lock_err, to_storage_err};

/// File-backed (or in-memory) SQLite key/value store.
pub struct SqliteKv {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteKv {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub fn open(path: &Path) -> TetherResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> TetherResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, db_path: Option<PathBuf>) -> TetherResult<Self> {
        pragmas::apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        tracing::debug!(path = ?db_path, "sqlite kv opened");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn with_conn<F, T>(&self, f: F) -> TetherResult<T>
    where
        F: FnOnce(&mut Connection) -> TetherResult<T>,
    {
        let mut guard = self.conn.lock().map_err(|_| lock_err("sqlite connection"))?;
        f(&mut guard)
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> TetherResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| to_storage_err(e.to_string()))
        })
    }

    fn apply(&self, writes: &[KvWrite]) -> TetherResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| to_storage_err(e.to_string()))?;
            for write in writes {
                match write {
                    KvWrite::Put { key, value } => {
                        tx.execute(
                            "INSERT INTO kv (key, value) VALUES (?1, ?2)
                             ON CONFLICT(key) DO UPDATE SET
                                 value = excluded.value,
                                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                            params![key, value],
                        )
                        .map_err(|e| to_storage_err(e.to_string()))?;
                    }
                    KvWrite::Delete { key } => {
                        tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                            .map_err(|e| to_storage_err(e.to_string()))?;
                    }
                }
            }
            tx.commit().map_err(|e| to_storage_err(e.to_string()))
        })
    }
}
