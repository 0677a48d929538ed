//! Durable mutation-queue entries.

use crate::entity::{Entity, ResourceType, Timestamp};
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one queued mutation.
///
/// The token never changes once assigned and doubles as the idempotency
/// token on the wire, so a replayed remote issuance is detectable
/// server-side.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MutationToken(Uuid);

impl MutationToken {
    /// Mints a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MutationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MutationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MutationToken({})", self.0)
    }
}

impl fmt::Display for MutationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of local operation a queue entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    /// Create a new resource.
    Create,
    /// Replace the mutable fields of an existing resource.
    Update,
    /// Delete an existing resource.
    Delete,
}

/// Lifecycle status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Waiting to be drained.
    Pending,
    /// Handed to the remote, response not yet applied.
    Syncing,
    /// Last attempt failed; eligible for requeue.
    Failed,
    /// Confirmed by the remote. Terminal; synced entries leave the queue.
    Synced,
}

/// One durable record of a not-yet-confirmed local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry identity and idempotency token.
    pub id: MutationToken,
    /// Queue-assigned monotonic insertion counter; the FIFO order key.
    pub sequence: u64,
    /// Wall-clock insertion time.
    pub timestamp: Timestamp,
    /// What the mutation does.
    pub operation: OperationType,
    /// Which collection the resource belongs to.
    pub resource_type: ResourceType,
    /// The resource the mutation targets.
    pub resource_id: EntityId,
    /// Owning list, for item mutations.
    pub parent_id: Option<EntityId>,
    /// The mutation body. `None` for deletes.
    pub payload: Option<Entity>,
    /// The version this mutation believes it is applying against.
    pub expected_version: u64,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Current lifecycle status.
    pub status: EntryStatus,
    /// Message from the last failed attempt.
    pub last_error: Option<String>,
    /// Wall-clock time of the last attempt.
    pub last_attempt: Option<Timestamp>,
}

impl QueueEntry {
    /// Returns true if the entry is waiting to be drained.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    /// Returns true if the entry records a delete.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.operation == OperationType::Delete
    }
}
