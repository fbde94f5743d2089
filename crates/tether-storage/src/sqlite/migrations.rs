//! Schema migrations tracked through `PRAGMA user_version`.

use rusqlite::Connection;

use tether_core::errors::{StorageError, TetherResult};

use crate::to_storage_err;

type Migration = fn(&Connection) -> TetherResult<()>;

const MIGRATIONS: &[Migration] = &[v001_kv_table];

pub const LATEST_VERSION: u32 = MIGRATIONS.len() as u32;

pub fn run_migrations(conn: &Connection) -> TetherResult<()> {
    let current = current_version(conn)?;
    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = idx as u32 + 1;
        if version <= current {
            continue;
        }
        migration(conn).map_err(|e| StorageError::SqliteError {
            message: format!("migration v{version:03} failed: {e}"),
        })?;
        conn.pragma_update(None, "user_version", version)
            .map_err(|e| to_storage_err(e.to_string()))?;
        tracing::info!(version, "applied storage migration");
    }
    Ok(())
}

pub fn current_version(conn: &Connection) -> TetherResult<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))
}

fn v001_kv_table(conn: &Connection) -> TetherResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))
}
