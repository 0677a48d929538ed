//! Local-write facade.

use crate::error::{EngineError, EngineResult};
use offlist_model::{now_millis, CallerId, Entity, EntityId, EntityKind, OperationType, QueueEntry};
use offlist_store::{EntityCache, MutationQueue};
use std::sync::Arc;

/// Validated optimistic writes against the local replica.
///
/// Every accepted intent lands in two places: the entity cache (so the
/// presentation layer sees it immediately) and the mutation queue (the
/// durable record the driver replays). Invalid input is rejected before
/// either, so the queue never carries an unsendable mutation.
pub struct Replica {
    cache: Arc<EntityCache>,
    queue: Arc<MutationQueue>,
    caller: CallerId,
}

impl Replica {
    /// Creates a facade over the replica's stores.
    #[must_use]
    pub fn new(cache: Arc<EntityCache>, queue: Arc<MutationQueue>, caller: CallerId) -> Self {
        Self {
            cache,
            queue,
            caller,
        }
    }

    /// Returns the entity cache.
    #[must_use]
    pub fn cache(&self) -> Arc<EntityCache> {
        Arc::clone(&self.cache)
    }

    /// Returns the mutation queue.
    #[must_use]
    pub fn queue(&self) -> Arc<MutationQueue> {
        Arc::clone(&self.queue)
    }

    /// Creates a list under a temporary id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unacceptable input, or a store
    /// error if persistence fails.
    pub fn create_list(&self, name: impl Into<String>) -> EngineResult<Entity> {
        let mut entity = Entity::new_list(name, self.caller.clone());
        entity.position = self.cache.get_all_by_parent(None).len() as u32;
        self.commit_create(entity)
    }

    /// Creates an item in a list, under a temporary id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unacceptable input, or a store
    /// error if persistence fails.
    pub fn create_item(&self, parent: EntityId, name: impl Into<String>) -> EngineResult<Entity> {
        let mut entity = Entity::new_item(parent, name, self.caller.clone());
        entity.position = self.cache.get_all_by_parent(Some(parent)).len() as u32;
        self.commit_create(entity)
    }

    fn commit_create(&self, entity: Entity) -> EngineResult<Entity> {
        entity.validate()?;
        let resource_type = entity.resource_type();
        let parent_id = entity.parent_id();
        self.cache.put(entity.clone())?;
        self.queue.enqueue(
            OperationType::Create,
            resource_type,
            entity.id,
            Some(entity.clone()),
            entity.version,
            parent_id,
        )?;
        Ok(entity)
    }

    /// Records an edit to an existing record.
    ///
    /// The queued mutation carries the cached record's version as the
    /// belief it applies against; the local version is never bumped —
    /// only the gate moves versions forward.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unacceptable input, or a store
    /// error if persistence fails.
    pub fn update(&self, mut entity: Entity) -> EngineResult<QueueEntry> {
        entity.validate()?;
        let expected_version = self
            .cache
            .get(&entity.id)
            .map(|cached| cached.version)
            .unwrap_or(entity.version);
        entity.version = expected_version;
        entity.updated_at = now_millis();
        entity.updated_by = self.caller.clone();

        let resource_type = entity.resource_type();
        let parent_id = entity.parent_id();
        self.cache.put(entity.clone())?;
        let entry = self.queue.enqueue(
            OperationType::Update,
            resource_type,
            entity.id,
            Some(entity),
            expected_version,
            parent_id,
        )?;
        Ok(entry)
    }

    /// Records a delete. Unknown ids are a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns a store error if persistence fails.
    pub fn delete(&self, id: EntityId) -> EngineResult<Option<QueueEntry>> {
        let cached = match self.cache.get(&id) {
            Some(cached) => cached,
            None => return Ok(None),
        };
        self.cache.remove(&id)?;
        let entry = self.queue.enqueue(
            OperationType::Delete,
            cached.resource_type(),
            id,
            None,
            cached.version,
            cached.parent_id(),
        )?;
        Ok(Some(entry))
    }

    /// Sets the completion flag on an item.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids or non-item resources.
    pub fn set_completed(&self, id: EntityId, completed: bool) -> EngineResult<QueueEntry> {
        let mut cached = self
            .cache
            .get(&id)
            .ok_or_else(|| EngineError::Protocol(format!("unknown resource: {id}")))?;
        match &mut cached.kind {
            EntityKind::Item { completed: c, .. } => *c = completed,
            EntityKind::List { .. } => {
                return Err(EngineError::Protocol(
                    "only items carry a completion flag".into(),
                ))
            }
        }
        self.update(cached)
    }

    /// Sets the soft-delete flag on a record.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids.
    pub fn set_archived(&self, id: EntityId, archived: bool) -> EngineResult<QueueEntry> {
        let mut cached = self
            .cache
            .get(&id)
            .ok_or_else(|| EngineError::Protocol(format!("unknown resource: {id}")))?;
        cached.archived = archived;
        self.update(cached)
    }

    /// Sets the completion flag on many items.
    ///
    /// Fans out into one queued UPDATE per item, so each drains under
    /// the version-aware contract. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn bulk_complete(
        &self,
        ids: &[EntityId],
        completed: bool,
    ) -> EngineResult<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for id in ids {
            if self.cache.get(id).is_some() {
                entries.push(self.set_completed(*id, completed)?);
            }
        }
        Ok(entries)
    }

    /// Deletes many records. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn bulk_delete(&self, ids: &[EntityId]) -> EngineResult<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for id in ids {
            if let Some(entry) = self.delete(*id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Rewrites item positions within a list, in the given order.
    ///
    /// The queued path fans out into per-item versioned UPDATEs; ids
    /// that are not items of the list are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn reorder(&self, list_id: EntityId, ordered: &[EntityId]) -> EngineResult<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for (index, id) in ordered.iter().enumerate() {
            let cached = match self.cache.get(id) {
                Some(cached) => cached,
                None => continue,
            };
            match cached.kind {
                EntityKind::Item { parent_id, .. } if parent_id == list_id => {
                    let mut edit = cached;
                    edit.position = index as u32;
                    entries.push(self.update(edit)?);
                }
                _ => {
                    tracing::debug!(%id, %list_id, "skipping reorder of foreign resource");
                }
            }
        }
        Ok(entries)
    }
}
