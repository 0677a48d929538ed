//! Replica cache of last-known-good entity records.

use crate::backend::{MemoryBackend, SnapshotBackend};
use crate::codec;
use crate::error::StoreResult;
use offlist_model::{Entity, EntityId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Durable local replica of list/item records, keyed by identity.
///
/// All writes are whole-record replacements. `get` on a missing id is an
/// explicit `None`, never an error. Remote-origin records must go through
/// [`EntityCache::apply_remote`], which refuses version regression — the
/// sync driver is the only caller expected to hold server-sourced records.
pub struct EntityCache {
    backend: Box<dyn SnapshotBackend>,
    inner: RwLock<HashMap<EntityId, Entity>>,
}

impl EntityCache {
    /// Opens a cache over the given backend, loading any prior snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub fn open(backend: Box<dyn SnapshotBackend>) -> StoreResult<Self> {
        let entities: Vec<Entity> = match backend.load()? {
            Some(bytes) => codec::decode(&bytes)?,
            None => Vec::new(),
        };
        let map = entities.into_iter().map(|e| (e.id, e)).collect();
        Ok(Self {
            backend,
            inner: RwLock::new(map),
        })
    }

    /// Creates an ephemeral cache for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the record for `id`, or `None` if not cached.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.inner.read().get(id).cloned()
    }

    /// Returns records filtered by owner, ordered by position.
    ///
    /// `None` selects top-level lists; `Some(parent)` selects the items of
    /// that list.
    #[must_use]
    pub fn get_all_by_parent(&self, parent: Option<EntityId>) -> Vec<Entity> {
        let mut records: Vec<Entity> = self
            .inner
            .read()
            .values()
            .filter(|e| e.parent_id() == parent)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Returns records filtered by the soft-delete flag.
    #[must_use]
    pub fn get_all_by_status(&self, archived: bool) -> Vec<Entity> {
        let mut records: Vec<Entity> = self
            .inner
            .read()
            .values()
            .filter(|e| e.archived == archived)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Stores a record, replacing any previous one with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn put(&self, entity: Entity) -> StoreResult<()> {
        let mut map = self.inner.write();
        map.insert(entity.id, entity);
        self.persist(&map)
    }

    /// Stores many records in one persisted write.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn put_many(&self, entities: Vec<Entity>) -> StoreResult<()> {
        let mut map = self.inner.write();
        for entity in entities {
            map.insert(entity.id, entity);
        }
        self.persist(&map)
    }

    /// Removes a record. Succeeds silently when the id is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn remove(&self, id: &EntityId) -> StoreResult<()> {
        let mut map = self.inner.write();
        if map.remove(id).is_some() {
            self.persist(&map)?;
        }
        Ok(())
    }

    /// Applies a server-sourced record, refusing version regression.
    ///
    /// Returns `true` if the record was applied, `false` if the cache
    /// already held the same or a newer version. A response carrying
    /// version N never overwrites a cached version ≥ N.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn apply_remote(&self, entity: Entity) -> StoreResult<bool> {
        let mut map = self.inner.write();
        if let Some(cached) = map.get(&entity.id) {
            if cached.version >= entity.version {
                tracing::debug!(
                    id = %entity.id,
                    cached = cached.version,
                    incoming = entity.version,
                    "ignoring stale remote record"
                );
                return Ok(false);
            }
        }
        map.insert(entity.id, entity);
        self.persist(&map)?;
        Ok(true)
    }

    /// Returns the number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn persist(&self, map: &HashMap<EntityId, Entity>) -> StoreResult<()> {
        let snapshot: Vec<&Entity> = map.values().collect();
        let bytes = codec::encode(&snapshot)?;
        self.backend.store(&bytes)
    }
}
