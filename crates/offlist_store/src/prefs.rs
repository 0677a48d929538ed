//! Client-local preference side table.

use crate::backend::{MemoryBackend, SnapshotBackend};
use crate::codec;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Small durable key-value table for client-local preferences.
///
/// Holds things like the device's caller id or UI settings; never synced.
pub struct PrefStore {
    backend: Box<dyn SnapshotBackend>,
    inner: RwLock<BTreeMap<String, String>>,
}

impl PrefStore {
    /// Opens the table over the given backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub fn open(backend: Box<dyn SnapshotBackend>) -> StoreResult<Self> {
        let map = match backend.load()? {
            Some(bytes) => codec::decode(&bytes)?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            backend,
            inner: RwLock::new(map),
        })
    }

    /// Creates an ephemeral table for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    /// Sets `key` to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
        let mut map = self.inner.write();
        map.insert(key.into(), value.into());
        let bytes = codec::encode(&*map)?;
        self.backend.store(&bytes)
    }

    /// Removes `key`. A no-op when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        let mut map = self.inner.write();
        if map.remove(key).is_some() {
            let bytes = codec::encode(&*map)?;
            self.backend.store(&bytes)?;
        }
        Ok(())
    }

    /// Returns all keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }
}
