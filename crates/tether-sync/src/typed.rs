//! Typed access to one collection. Shape checks happen when `T` is
//! (de)serialized; the store itself only sees JSON objects.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use tether_core::errors::TetherResult;
use tether_core::models::CachedRecord;

use crate::engine::SyncEngine;

pub struct TypedCollection<'e, T> {
    engine: &'e SyncEngine,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'e, T> TypedCollection<'e, T> {
    pub(crate) fn new(engine: &'e SyncEngine, name: String) -> Self {
        Self {
            engine,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> TypedCollection<'_, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create from a value. Returns the stored id.
    pub fn create(&self, value: &T) -> TetherResult<String> {
        let record = self.engine.create(&self.name, serde_json::to_value(value)?)?;
        Ok(record.id)
    }

    /// Replace the fields `value` serializes.
    pub fn update(&self, id: &str, value: &T) -> TetherResult<T> {
        let record = self
            .engine
            .update(&self.name, id, serde_json::to_value(value)?)?;
        decode(record)
    }

    pub fn delete(&self, id: &str) -> TetherResult<()> {
        self.engine.delete(&self.name, id)
    }

    pub fn get(&self, id: &str) -> TetherResult<Option<T>> {
        self.engine
            .get(&self.name, id)?
            .map(decode)
            .transpose()
    }

    pub fn all(&self) -> TetherResult<Vec<T>> {
        self.engine
            .get_all(&self.name)?
            .into_iter()
            .map(decode)
            .collect()
    }
}

fn decode<T: DeserializeOwned>(record: CachedRecord) -> TetherResult<T> {
    Ok(serde_json::from_value(Value::Object(record.payload))?)
}
