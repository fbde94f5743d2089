//! Persisted sync metadata: watermark, device identity, registration flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tether_core::errors::{StorageError, TetherResult};
use tether_core::time::{format_timestamp, parse_timestamp};

use crate::txn::StoreContext;

pub struct SyncMetadata {
    ctx: Arc<StoreContext>,
}

impl SyncMetadata {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    /// Watermark of the last completed cycle.
    pub fn last_sync(&self) -> TetherResult<Option<DateTime<Utc>>> {
        self.ctx.transaction(|txn| {
            let key = txn.keys().last_sync();
            match txn.get(&key)? {
                Some(raw) => parse_timestamp(&raw).map(Some).map_err(|e| {
                    StorageError::Corrupt {
                        key,
                        reason: e.to_string(),
                    }
                    .into()
                }),
                None => Ok(None),
            }
        })
    }

    pub fn set_last_sync(&self, ts: DateTime<Utc>) -> TetherResult<()> {
        self.ctx.transaction(|txn| {
            txn.put(txn.keys().last_sync(), format_timestamp(&ts));
            Ok(())
        })
    }

    pub fn device_id(&self) -> TetherResult<Option<String>> {
        self.ctx
            .transaction(|txn| txn.get(&txn.keys().device_id()))
    }

    /// Stored device id, or a freshly generated one that is persisted first.
    pub fn get_or_create_device_id(&self) -> TetherResult<String> {
        self.ctx.transaction(|txn| {
            let key = txn.keys().device_id();
            if let Some(existing) = txn.get(&key)? {
                return Ok(existing);
            }
            let id = uuid::Uuid::new_v4().to_string();
            txn.put(key, id.clone());
            Ok(id)
        })
    }

    pub fn is_registered(&self) -> TetherResult<bool> {
        self.ctx.transaction(|txn| {
            Ok(txn.get(&txn.keys().device_registered())?.as_deref() == Some("true"))
        })
    }

    pub fn set_registered(&self) -> TetherResult<()> {
        self.ctx.transaction(|txn| {
            txn.put(txn.keys().device_registered(), "true".to_string());
            Ok(())
        })
    }
}
