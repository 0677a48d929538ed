//! Conflict classification and resolution.

use crate::error::{EngineError, EngineResult};
use offlist_model::{
    merge_preferring_newer, ConflictKind, ConflictRecord, Entity, EntityId, OperationType,
    QueueEntry, Resolution,
};
use offlist_store::{EntityCache, MutationQueue};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// What became of a rejected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionHandling {
    /// Resolved without surfacing; cache and queue are already rewritten.
    Auto(Resolution),
    /// A record awaits an explicit choice.
    Surfaced(Uuid),
}

/// Classifies gate rejections and applies resolution strategies.
///
/// Owns the live [`ConflictRecord`]s. Auto-resolution handles the
/// provably safe cases; everything else parks a record until a caller
/// picks a strategy. Any resolution that re-enqueues appends at the
/// current queue tail — updated intent always races fresh.
pub struct ConflictResolver {
    cache: Arc<EntityCache>,
    queue: Arc<MutationQueue>,
    records: RwLock<Vec<ConflictRecord>>,
}

impl ConflictResolver {
    /// Creates a resolver over the replica's cache and queue.
    #[must_use]
    pub fn new(cache: Arc<EntityCache>, queue: Arc<MutationQueue>) -> Self {
        Self {
            cache,
            queue,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Classifies a rejection.
    ///
    /// A missing server record is a `Deleted` conflict. Content-identical
    /// divergence qualifies as `VersionMismatch` only for updates — a
    /// delete intent is never auto-merged into an update.
    #[must_use]
    pub fn classify(&self, entry: &QueueEntry, server: Option<&Entity>) -> ConflictKind {
        match server {
            None => ConflictKind::Deleted,
            Some(server) => match (&entry.operation, &entry.payload) {
                (OperationType::Update, Some(payload)) if payload.same_content(server) => {
                    ConflictKind::VersionMismatch
                }
                _ => ConflictKind::Modified,
            },
        }
    }

    /// Handles a gate rejection of a queued entry.
    ///
    /// Auto-resolvable cases rewrite the cache and queue immediately;
    /// the rest surface a [`ConflictRecord`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cache or queue cannot be updated.
    pub fn handle_rejection(
        &self,
        entry: &QueueEntry,
        server: Option<Entity>,
        message: &str,
    ) -> EngineResult<RejectionHandling> {
        let kind = self.classify(entry, server.as_ref());
        match kind {
            ConflictKind::Deleted => {
                // No server record to argue with: adopt the deletion. For
                // a delete intent the end state already matches.
                tracing::debug!(resource = %entry.resource_id, "auto-resolving deleted conflict");
                self.queue.remove(entry.id)?;
                self.cache.remove(&entry.resource_id)?;
                Ok(RejectionHandling::Auto(Resolution::UseServer))
            }
            ConflictKind::VersionMismatch => {
                let server = server.ok_or_else(|| {
                    EngineError::Protocol("version mismatch without server record".into())
                })?;
                tracing::debug!(resource = %entry.resource_id, "auto-merging version mismatch");
                self.apply_merge(entry, &server)?;
                Ok(RejectionHandling::Auto(Resolution::Merge))
            }
            ConflictKind::Modified => {
                let local = self.cache.get(&entry.resource_id);
                let record =
                    ConflictRecord::new(entry.clone(), local, server, ConflictKind::Modified, message);
                let id = record.id;
                tracing::info!(resource = %entry.resource_id, record = %id, "conflict surfaced");
                self.records.write().push(record);
                Ok(RejectionHandling::Surfaced(id))
            }
        }
    }

    /// Applies a strategy to a surfaced record and destroys it.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown record id, or if the cache or
    /// queue cannot be updated.
    pub fn resolve(&self, record_id: Uuid, resolution: Resolution) -> EngineResult<()> {
        let record = {
            let mut records = self.records.write();
            let index = records
                .iter()
                .position(|r| r.id == record_id)
                .ok_or_else(|| {
                    EngineError::Protocol(format!("unknown conflict record: {record_id}"))
                })?;
            records.swap_remove(index)
        };
        let entry = record.entry;

        match resolution {
            Resolution::UseServer => {
                self.queue.remove(entry.id)?;
                match record.server {
                    Some(server) => {
                        self.cache.apply_remote(server)?;
                    }
                    None => self.cache.remove(&entry.resource_id)?,
                }
            }
            Resolution::Cancel => {
                self.queue.remove(entry.id)?;
            }
            Resolution::Merge => match record.server {
                Some(server) => self.apply_merge(&entry, &server)?,
                // Nothing to merge with: the deletion stands.
                None => {
                    self.queue.remove(entry.id)?;
                    self.cache.remove(&entry.resource_id)?;
                }
            },
            Resolution::UseLocal => {
                self.queue.remove(entry.id)?;
                match (record.server, entry.operation) {
                    (Some(server), operation) => {
                        // Rebase the intent onto the server's current version.
                        self.queue.enqueue(
                            operation,
                            entry.resource_type,
                            entry.resource_id,
                            entry.payload.clone(),
                            server.version,
                            entry.parent_id,
                        )?;
                    }
                    (None, OperationType::Delete) => {
                        // Already gone remotely; the intent is satisfied.
                        self.cache.remove(&entry.resource_id)?;
                    }
                    (None, _) => {
                        // Deleted remotely: the pending update becomes a
                        // create under a fresh temporary id.
                        let mut payload = entry.payload.clone().ok_or_else(|| {
                            EngineError::Protocol("update entry without payload".into())
                        })?;
                        self.cache.remove(&entry.resource_id)?;
                        payload.id = EntityId::temporary();
                        payload.version = 1;
                        self.cache.put(payload.clone())?;
                        self.queue.enqueue(
                            OperationType::Create,
                            entry.resource_type,
                            payload.id,
                            Some(payload),
                            1,
                            entry.parent_id,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the surfaced records awaiting a choice.
    #[must_use]
    pub fn pending_records(&self) -> Vec<ConflictRecord> {
        self.records.read().clone()
    }

    /// Number of surfaced records.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.records.read().len()
    }

    /// Resources currently held by surfaced records.
    #[must_use]
    pub fn pending_resource_ids(&self) -> HashSet<EntityId> {
        self.records
            .read()
            .iter()
            .map(|r| r.resource_id())
            .collect()
    }

    fn apply_merge(&self, entry: &QueueEntry, server: &Entity) -> EngineResult<()> {
        let base = entry
            .payload
            .clone()
            .or_else(|| self.cache.get(&entry.resource_id))
            .ok_or_else(|| EngineError::Protocol("merge without a local record".into()))?;
        let merged = merge_preferring_newer(&base, server);

        self.cache.put(merged.clone())?;
        self.queue.remove(entry.id)?;
        self.queue.enqueue(
            OperationType::Update,
            entry.resource_type,
            server.id,
            Some(merged),
            server.version,
            entry.parent_id,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offlist_model::{CallerId, EntryStatus, ResourceType};

    struct Fixture {
        cache: Arc<EntityCache>,
        queue: Arc<MutationQueue>,
        resolver: ConflictResolver,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(EntityCache::in_memory());
        let queue = Arc::new(MutationQueue::in_memory());
        let resolver = ConflictResolver::new(Arc::clone(&cache), Arc::clone(&queue));
        Fixture {
            cache,
            queue,
            resolver,
        }
    }

    fn caller() -> CallerId {
        CallerId::new("tester")
    }

    /// Enqueues an update for a cached list and returns the entry.
    fn queued_update(f: &Fixture, name: &str) -> QueueEntry {
        let mut entity = Entity::new_list(name, caller());
        entity.id = EntityId::assigned();
        f.cache.put(entity.clone()).unwrap();
        f.queue
            .enqueue(
                OperationType::Update,
                ResourceType::List,
                entity.id,
                Some(entity),
                1,
                None,
            )
            .unwrap()
    }

    fn server_copy(entry: &QueueEntry, version: u64) -> Entity {
        let mut server = entry.payload.clone().unwrap();
        server.version = version;
        server.updated_by = CallerId::new("other-device");
        server
    }

    #[test]
    fn deleted_resolves_automatically() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");

        let handling = f
            .resolver
            .handle_rejection(&entry, None, "not found")
            .unwrap();
        assert_eq!(handling, RejectionHandling::Auto(Resolution::UseServer));
        assert!(f.queue.is_empty());
        assert_eq!(f.cache.get(&entry.resource_id), None);
        assert_eq!(f.resolver.pending_count(), 0);
    }

    #[test]
    fn version_mismatch_auto_merges_leaving_one_entry() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        // Identical content, diverged version.
        let server = server_copy(&entry, 3);

        let handling = f
            .resolver
            .handle_rejection(&entry, Some(server.clone()), "version_conflict")
            .unwrap();
        assert_eq!(handling, RejectionHandling::Auto(Resolution::Merge));

        let entries = f.queue.entries();
        assert_eq!(entries.len(), 1);
        let rebased = &entries[0];
        assert_ne!(rebased.id, entry.id);
        assert_eq!(rebased.operation, OperationType::Update);
        assert_eq!(rebased.expected_version, 3);
        assert_eq!(rebased.status, EntryStatus::Pending);

        // The cache adopted the server baseline.
        assert_eq!(f.cache.get(&entry.resource_id).unwrap().version, 3);
    }

    #[test]
    fn delete_intent_is_never_auto_merged() {
        let f = fixture();
        let mut entity = Entity::new_list("Groceries", caller());
        entity.id = EntityId::assigned();
        f.cache.put(entity.clone()).unwrap();
        let entry = f
            .queue
            .enqueue(
                OperationType::Delete,
                ResourceType::List,
                entity.id,
                None,
                1,
                None,
            )
            .unwrap();

        let mut server = entity.clone();
        server.version = 2;
        let handling = f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap();
        assert!(matches!(handling, RejectionHandling::Surfaced(_)));
        assert_eq!(f.resolver.pending_count(), 1);
    }

    #[test]
    fn modified_surfaces_a_record() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        let mut server = server_copy(&entry, 4);
        server.name = "Diverged".into();

        let handling = f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap();
        let record_id = match handling {
            RejectionHandling::Surfaced(id) => id,
            other => panic!("unexpected: {other:?}"),
        };

        let records = f.resolver.pending_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record_id);
        assert_eq!(records[0].kind, ConflictKind::Modified);
        assert!(f
            .resolver
            .pending_resource_ids()
            .contains(&entry.resource_id));
    }

    #[test]
    fn resolve_use_server_adopts_server_record() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        let mut server = server_copy(&entry, 4);
        server.name = "Server name".into();

        let id = match f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap()
        {
            RejectionHandling::Surfaced(id) => id,
            other => panic!("unexpected: {other:?}"),
        };

        f.resolver.resolve(id, Resolution::UseServer).unwrap();
        assert!(f.queue.is_empty());
        let cached = f.cache.get(&entry.resource_id).unwrap();
        assert_eq!(cached.name, "Server name");
        assert_eq!(cached.version, 4);
        assert_eq!(f.resolver.pending_count(), 0);
    }

    #[test]
    fn resolve_use_local_rebases_at_tail() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        let mut server = server_copy(&entry, 4);
        server.name = "Server name".into();

        let id = match f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap()
        {
            RejectionHandling::Surfaced(id) => id,
            other => panic!("unexpected: {other:?}"),
        };

        // Another intent lands before resolution.
        let later = queued_update(&f, "Other list");

        f.resolver.resolve(id, Resolution::UseLocal).unwrap();

        let entries = f.queue.entries();
        assert_eq!(entries.len(), 2);
        let rebased = entries.last().unwrap();
        assert_eq!(rebased.resource_id, entry.resource_id);
        assert_eq!(rebased.expected_version, 4);
        // Appended at the tail, after the later intent.
        assert!(rebased.sequence > later.sequence);
        // Local cache keeps the local name.
        assert_eq!(f.cache.get(&entry.resource_id).unwrap().name, "Groceries");
    }

    #[test]
    fn resolve_use_local_on_deleted_becomes_create() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        // Force a surfaced record with no server side: classify as
        // modified by making the entry a delete-resistant shape.
        let mut server = server_copy(&entry, 2);
        server.name = "Diverged".into();
        let id = match f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap()
        {
            RejectionHandling::Surfaced(id) => id,
            other => panic!("unexpected: {other:?}"),
        };

        // Simulate the server record vanishing before the choice: rewrite
        // the record's server side through a fresh rejection instead.
        f.resolver.resolve(id, Resolution::Cancel).unwrap();
        let entry = queued_update(&f, "Groceries");
        let record = ConflictRecord::new(
            entry.clone(),
            f.cache.get(&entry.resource_id),
            None,
            ConflictKind::Modified,
            "deleted remotely",
        );
        let record_id = record.id;
        f.resolver.records.write().push(record);

        f.resolver.resolve(record_id, Resolution::UseLocal).unwrap();

        let entries = f.queue.entries();
        assert_eq!(entries.len(), 1);
        let create = &entries[0];
        assert_eq!(create.operation, OperationType::Create);
        assert!(create.resource_id.is_temporary());
        assert_ne!(create.resource_id, entry.resource_id);
        // The old id left the cache; the new temporary took its place.
        assert_eq!(f.cache.get(&entry.resource_id), None);
        assert!(f.cache.get(&create.resource_id).is_some());
    }

    #[test]
    fn resolve_cancel_keeps_cache() {
        let f = fixture();
        let entry = queued_update(&f, "Groceries");
        let mut server = server_copy(&entry, 4);
        server.name = "Server name".into();

        let id = match f
            .resolver
            .handle_rejection(&entry, Some(server), "version_conflict")
            .unwrap()
        {
            RejectionHandling::Surfaced(id) => id,
            other => panic!("unexpected: {other:?}"),
        };

        f.resolver.resolve(id, Resolution::Cancel).unwrap();
        assert!(f.queue.is_empty());
        // Cache stays at the last-known local value.
        assert_eq!(f.cache.get(&entry.resource_id).unwrap().name, "Groceries");
    }

    #[test]
    fn resolve_unknown_record_errors() {
        let f = fixture();
        let result = f.resolver.resolve(Uuid::new_v4(), Resolution::Cancel);
        assert!(matches!(result, Err(EngineError::Protocol(_))));
    }
}
