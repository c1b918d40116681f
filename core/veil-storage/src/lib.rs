//! Key-value persistence for the Veil client.
//!
//! Every piece of client state that survives a restart (device identity,
//! per-app unlock flags, the cached disguise decision) is a string or a
//! boolean under a well-known key. Services take an
//! `Arc<dyn KeyValueStore>` so the host can plug in whatever backing
//! store it has; this crate ships an in-memory store and a JSON file store.
//!
//! Writes are last-writer-wins. Stores are expected to be shared across
//! tasks, so every method takes `&self`.

mod error;
mod file;
pub mod keys;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use veil_types::Timestamp;

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Text(String),
}

/// A string/boolean key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<StoredValue>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: StoredValue) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Reads a string value. Booleans are rendered as `"true"`/`"false"`.
    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get(key)?.map(|value| match value {
            StoredValue::Text(text) => text,
            StoredValue::Bool(flag) => flag.to_string(),
        }))
    }

    /// Stores a string value.
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set(key, StoredValue::Text(value.to_string()))
    }

    /// Reads a boolean value. The strings `"true"` and `"false"` are
    /// accepted too.
    fn get_bool(&self, key: &str) -> StorageResult<Option<bool>> {
        match self.get(key)? {
            None => Ok(None),
            Some(StoredValue::Bool(flag)) => Ok(Some(flag)),
            Some(StoredValue::Text(text)) => match text.as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                other => Err(StorageError::InvalidData(format!(
                    "{key}: expected boolean, found {other:?}"
                ))),
            },
        }
    }

    /// Stores a boolean value.
    fn set_bool(&self, key: &str, value: bool) -> StorageResult<()> {
        self.set(key, StoredValue::Bool(value))
    }

    /// Reads a timestamp stored as decimal epoch seconds.
    fn get_timestamp(&self, key: &str) -> StorageResult<Option<Timestamp>> {
        match self.get_string(key)? {
            None => Ok(None),
            Some(raw) => Timestamp::parse(&raw)
                .map(Some)
                .map_err(|e| StorageError::InvalidData(format!("{key}: {e}"))),
        }
    }

    /// Stores a timestamp as decimal epoch seconds.
    fn set_timestamp(&self, key: &str, value: Timestamp) -> StorageResult<()> {
        self.set_string(key, &value.to_string())
    }
}
