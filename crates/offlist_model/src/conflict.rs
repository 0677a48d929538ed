//! Conflict records and resolution strategies.

use crate::entity::Entity;
use crate::id::EntityId;
use crate::queue::QueueEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a gate rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Remote content diverged from the local record.
    Modified,
    /// The resource no longer exists remotely.
    Deleted,
    /// Versions differ but the comparable fields are identical; safe to
    /// merge mechanically.
    VersionMismatch,
}

/// How to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Rebase the queued mutation onto the server's current version. A
    /// remotely deleted resource is re-created under a fresh temporary id.
    UseLocal,
    /// Discard the local change and adopt the server record.
    UseServer,
    /// Field-by-field merge preferring the newer side, on the server's
    /// version baseline.
    Merge,
    /// Drop the queued mutation, leave the cache at its last-known value.
    Cancel,
}

/// A rejected queued mutation awaiting resolution.
///
/// Created when the concurrency gate rejects a drain attempt; destroyed
/// when a strategy is applied or the conflict is canceled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Record identity.
    pub id: Uuid,
    /// The rejected queue entry.
    pub entry: QueueEntry,
    /// Local pre-mutation snapshot, if the cache held one.
    pub local: Option<Entity>,
    /// The server's current record, or `None` if deleted remotely.
    pub server: Option<Entity>,
    /// Classification of the rejection.
    pub kind: ConflictKind,
    /// The triggering error, for display.
    pub message: String,
}

impl ConflictRecord {
    /// Creates a record for a rejected entry.
    #[must_use]
    pub fn new(
        entry: QueueEntry,
        local: Option<Entity>,
        server: Option<Entity>,
        kind: ConflictKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry,
            local,
            server,
            kind,
            message: message.into(),
        }
    }

    /// The resource the conflicting mutation targets.
    #[must_use]
    pub fn resource_id(&self) -> EntityId {
        self.entry.resource_id
    }

    /// The version the server currently holds, if the resource exists.
    #[must_use]
    pub fn server_version(&self) -> Option<u64> {
        self.server.as_ref().map(|e| e.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CallerId, ResourceType};
    use crate::queue::{EntryStatus, MutationToken, OperationType};

    fn record(kind: ConflictKind, server: Option<Entity>) -> ConflictRecord {
        let local = Entity::new_list("Groceries", CallerId::new("tester"));
        let entry = QueueEntry {
            id: MutationToken::new(),
            sequence: 1,
            timestamp: 1000,
            operation: OperationType::Update,
            resource_type: ResourceType::List,
            resource_id: local.id,
            parent_id: None,
            payload: Some(local.clone()),
            expected_version: 1,
            retry_count: 0,
            status: EntryStatus::Failed,
            last_error: None,
            last_attempt: None,
        };
        ConflictRecord::new(entry, Some(local), server, kind, "version_conflict")
    }

    #[test]
    fn resource_id_comes_from_entry() {
        let r = record(ConflictKind::Deleted, None);
        assert_eq!(r.resource_id(), r.entry.resource_id);
        assert_eq!(r.server_version(), None);
    }

    #[test]
    fn server_version_reflects_snapshot() {
        let mut server = Entity::new_list("Groceries", CallerId::new("other"));
        server.version = 4;
        let r = record(ConflictKind::Modified, Some(server));
        assert_eq!(r.server_version(), Some(4));
    }

    #[test]
    fn records_get_distinct_ids() {
        let a = record(ConflictKind::Modified, None);
        let b = record(ConflictKind::Modified, None);
        assert_ne!(a.id, b.id);
    }
}
