//! Durable FIFO mutation queue.

use crate::backend::{MemoryBackend, SnapshotBackend};
use crate::codec;
use crate::error::StoreResult;
use offlist_model::{
    now_millis, Entity, EntityId, EntityKind, EntryStatus, MutationToken, OperationType,
    QueueEntry, ResourceType,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Persisted shape of the queue.
#[derive(Serialize, Deserialize)]
struct QueueSnapshot {
    entries: Vec<QueueEntry>,
    next_sequence: u64,
}

struct QueueInner {
    entries: Vec<QueueEntry>,
    next_sequence: u64,
}

/// Durable, ordered log of not-yet-confirmed local mutations.
///
/// FIFO order by queue-assigned `sequence` is the core contract: later
/// entries for one resource (an UPDATE followed by a DELETE) must replay
/// in that order or the final state is wrong. The queue never reorders
/// entries.
pub struct MutationQueue {
    backend: Box<dyn SnapshotBackend>,
    inner: RwLock<QueueInner>,
}

impl MutationQueue {
    /// Opens a queue over the given backend, loading any prior snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded.
    pub fn open(backend: Box<dyn SnapshotBackend>) -> StoreResult<Self> {
        let inner = match backend.load()? {
            Some(bytes) => {
                let snapshot: QueueSnapshot = codec::decode(&bytes)?;
                QueueInner {
                    entries: snapshot.entries,
                    next_sequence: snapshot.next_sequence,
                }
            }
            None => QueueInner {
                entries: Vec::new(),
                next_sequence: 1,
            },
        };
        Ok(Self {
            backend,
            inner: RwLock::new(inner),
        })
    }

    /// Creates an ephemeral queue for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            inner: RwLock::new(QueueInner {
                entries: Vec::new(),
                next_sequence: 1,
            }),
        }
    }

    /// Appends a new pending entry and returns it.
    ///
    /// The queue assigns the token, the insertion sequence and the
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn enqueue(
        &self,
        operation: OperationType,
        resource_type: ResourceType,
        resource_id: EntityId,
        payload: Option<Entity>,
        expected_version: u64,
        parent_id: Option<EntityId>,
    ) -> StoreResult<QueueEntry> {
        let mut inner = self.inner.write();
        let entry = QueueEntry {
            id: MutationToken::new(),
            sequence: inner.next_sequence,
            timestamp: now_millis(),
            operation,
            resource_type,
            resource_id,
            parent_id,
            payload,
            expected_version,
            retry_count: 0,
            status: EntryStatus::Pending,
            last_error: None,
            last_attempt: None,
        };
        inner.next_sequence += 1;
        inner.entries.push(entry.clone());
        self.persist(&inner)?;
        Ok(entry)
    }

    /// Returns pending entries in insertion order.
    #[must_use]
    pub fn list_pending(&self) -> Vec<QueueEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .cloned()
            .collect()
    }

    /// Returns the entry with the given token.
    #[must_use]
    pub fn get(&self, id: MutationToken) -> Option<QueueEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Returns all entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.inner.read().entries.clone()
    }

    /// Marks an entry as handed to the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn mark_syncing(&self, id: MutationToken) -> StoreResult<()> {
        self.update_entry(id, |entry| {
            entry.status = EntryStatus::Syncing;
            entry.last_attempt = Some(now_millis());
        })
    }

    /// Confirms an entry: it leaves the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn mark_synced(&self, id: MutationToken) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        if inner.entries.len() != before {
            self.persist(&inner)?;
        }
        Ok(())
    }

    /// Records a failed attempt: increments the retry counter and parks
    /// the entry as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn mark_failed(&self, id: MutationToken, error: impl Into<String>) -> StoreResult<()> {
        let message = error.into();
        self.update_entry(id, |entry| {
            entry.status = EntryStatus::Failed;
            entry.retry_count += 1;
            entry.last_error = Some(message.clone());
            entry.last_attempt = Some(now_millis());
        })
    }

    /// Resets all failed entries to pending, preserving retry counts.
    ///
    /// Returns the number of entries reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn requeue_failed(&self) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let mut reset = 0;
        for entry in &mut inner.entries {
            if entry.status == EntryStatus::Failed {
                entry.status = EntryStatus::Pending;
                reset += 1;
            }
        }
        if reset > 0 {
            self.persist(&inner)?;
        }
        Ok(reset)
    }

    /// Recovers entries abandoned mid-drain: syncing back to pending.
    ///
    /// Returns the number of entries recovered. The mutation token makes
    /// a duplicate remote issuance detectable server-side if the first
    /// attempt actually landed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn reset_syncing(&self) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let mut reset = 0;
        for entry in &mut inner.entries {
            if entry.status == EntryStatus::Syncing {
                entry.status = EntryStatus::Pending;
                reset += 1;
            }
        }
        if reset > 0 {
            self.persist(&inner)?;
        }
        Ok(reset)
    }

    /// Returns true if an undrained DELETE exists for the resource.
    #[must_use]
    pub fn has_pending_delete(&self, resource_type: ResourceType, resource_id: EntityId) -> bool {
        self.inner.read().entries.iter().any(|e| {
            e.operation == OperationType::Delete
                && e.resource_type == resource_type
                && e.resource_id == resource_id
        })
    }

    /// Removes an entry. A no-op when the token is absent, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn remove(&self, id: MutationToken) -> StoreResult<()> {
        self.mark_synced(id)
    }

    /// Rewrites resource references after a create drains.
    ///
    /// Every entry targeting the temporary id (as resource, parent, or
    /// inside its payload) is repointed at the assigned id, preserving
    /// order and tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be persisted.
    pub fn reassign_resource(&self, from: EntityId, to: EntityId) -> StoreResult<usize> {
        let mut inner = self.inner.write();
        let mut touched = 0;
        for entry in &mut inner.entries {
            let mut changed = false;
            if entry.resource_id == from {
                entry.resource_id = to;
                changed = true;
            }
            if entry.parent_id == Some(from) {
                entry.parent_id = Some(to);
                changed = true;
            }
            if let Some(payload) = &mut entry.payload {
                if payload.id == from {
                    payload.id = to;
                    changed = true;
                }
                if let EntityKind::Item { parent_id, .. } = &mut payload.kind {
                    if *parent_id == from {
                        *parent_id = to;
                        changed = true;
                    }
                }
            }
            if changed {
                touched += 1;
            }
        }
        if touched > 0 {
            self.persist(&inner)?;
        }
        Ok(touched)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .count()
    }

    /// Number of failed entries.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Failed)
            .count()
    }

    /// Total entries still in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    fn update_entry(
        &self,
        id: MutationToken,
        apply: impl FnOnce(&mut QueueEntry),
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
            apply(entry);
            self.persist(&inner)?;
        }
        Ok(())
    }

    fn persist(&self, inner: &QueueInner) -> StoreResult<()> {
        let snapshot = QueueSnapshot {
            entries: inner.entries.clone(),
            next_sequence: inner.next_sequence,
        };
        let bytes = codec::encode(&snapshot)?;
        self.backend.store(&bytes)
    }
}
