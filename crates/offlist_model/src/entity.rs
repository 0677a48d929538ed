//! List and item entity records.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Wall-clock instant in Unix milliseconds.
pub type Timestamp = u64;

/// Maximum accepted length of an entity name, in characters.
pub const MAX_NAME_LEN: usize = 120;

/// Maximum accepted length of a description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Returns the current wall-clock time in Unix milliseconds.
#[must_use]
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Opaque caller identity carried on every authenticated request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(String);

impl CallerId {
    /// Wraps an opaque identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identity is empty (treated as absent).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallerId({})", self.0)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Which collection a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// A top-level list.
    List,
    /// An item owned by a list.
    Item,
}

/// Kind-specific payload of an entity.
///
/// Lists and items share one record envelope; the parts that differ live
/// behind this discriminant instead of parallel record types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A list with optional display color and icon.
    List {
        /// Display color, e.g. a hex string chosen by the client.
        color: Option<String>,
        /// Icon name from the gate's icon catalog.
        icon: Option<String>,
    },
    /// An item owned by a list.
    Item {
        /// The owning list.
        parent_id: EntityId,
        /// Completion flag.
        completed: bool,
        /// Quantity, at least 1.
        quantity: u32,
    },
}

/// A list or item record.
///
/// The server owns the authoritative `version`; clients only ever hold a
/// belief about it. `version` starts at 1 on creation and increments by
/// exactly 1 per accepted remote mutation. `archived` is the soft-delete
/// flag used for recovery windows; it travels as a normal mutable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Ordering position among siblings.
    pub position: u32,
    /// Soft-delete flag.
    pub archived: bool,
    /// Server-maintained monotonic version.
    pub version: u64,
    /// Unix-millisecond timestamp of the last accepted mutation.
    pub updated_at: Timestamp,
    /// Caller that performed the last accepted mutation.
    pub updated_by: CallerId,
    /// Kind-specific payload.
    pub kind: EntityKind,
}

impl Entity {
    /// Creates a new local list record with a temporary id.
    #[must_use]
    pub fn new_list(name: impl Into<String>, author: CallerId) -> Self {
        Self {
            id: EntityId::temporary(),
            name: name.into(),
            description: None,
            position: 0,
            archived: false,
            version: 1,
            updated_at: now_millis(),
            updated_by: author,
            kind: EntityKind::List {
                color: None,
                icon: None,
            },
        }
    }

    /// Creates a new local item record with a temporary id.
    #[must_use]
    pub fn new_item(parent_id: EntityId, name: impl Into<String>, author: CallerId) -> Self {
        Self {
            id: EntityId::temporary(),
            name: name.into(),
            description: None,
            position: 0,
            archived: false,
            version: 1,
            updated_at: now_millis(),
            updated_by: author,
            kind: EntityKind::Item {
                parent_id,
                completed: false,
                quantity: 1,
            },
        }
    }

    /// Returns the resource type implied by the kind.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self.kind {
            EntityKind::List { .. } => ResourceType::List,
            EntityKind::Item { .. } => ResourceType::Item,
        }
    }

    /// Returns the owning list id for items, `None` for lists.
    #[must_use]
    pub fn parent_id(&self) -> Option<EntityId> {
        match self.kind {
            EntityKind::List { .. } => None,
            EntityKind::Item { parent_id, .. } => Some(parent_id),
        }
    }

    /// Compares the user-visible fields, ignoring version and audit data.
    ///
    /// Two records with equal content but diverged versions are safe to
    /// reconcile mechanically.
    #[must_use]
    pub fn same_content(&self, other: &Entity) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.position == other.position
            && self.archived == other.archived
            && self.kind == other.kind
    }

    /// Validates user input before it may enter the mutation queue.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first rejected field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong {
                len: self.name.chars().count(),
            });
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::DescriptionTooLong {
                    len: description.chars().count(),
                });
            }
        }
        if let EntityKind::Item { quantity, .. } = self.kind {
            if quantity == 0 {
                return Err(ValidationError::ZeroQuantity);
            }
        }
        Ok(())
    }
}

/// Merges two divergent records of one entity, field by field.
///
/// Each mutable field is taken from the side with the later `updated_at`;
/// the server's `version`, `updated_at` and `updated_by` always become the
/// new baseline, and an item keeps the server's parent. This is the small
/// timestamp-wins heuristic; it makes no attempt at semantic merging.
#[must_use]
pub fn merge_preferring_newer(local: &Entity, server: &Entity) -> Entity {
    let local_newer = local.updated_at > server.updated_at;
    let newer = if local_newer { local } else { server };

    let kind = match (&local.kind, &server.kind) {
        (
            EntityKind::List {
                color: lc,
                icon: li,
            },
            EntityKind::List {
                color: sc,
                icon: si,
            },
        ) => EntityKind::List {
            color: if local_newer { lc.clone() } else { sc.clone() },
            icon: if local_newer { li.clone() } else { si.clone() },
        },
        (
            EntityKind::Item {
                completed: lc,
                quantity: lq,
                ..
            },
            EntityKind::Item {
                parent_id,
                completed: sc,
                quantity: sq,
            },
        ) => EntityKind::Item {
            parent_id: *parent_id,
            completed: if local_newer { *lc } else { *sc },
            quantity: if local_newer { *lq } else { *sq },
        },
        // Kinds never change after creation; trust the server if they do.
        _ => server.kind.clone(),
    };

    Entity {
        id: server.id,
        name: newer.name.clone(),
        description: newer.description.clone(),
        position: newer.position,
        archived: newer.archived,
        version: server.version,
        updated_at: server.updated_at,
        updated_by: server.updated_by.clone(),
        kind,
    }
}

/// Rejected local input, refused before it reaches the mutation queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty or whitespace.
    #[error("name must not be empty")]
    EmptyName,

    /// Name exceeds [`MAX_NAME_LEN`].
    #[error("name too long: {len} > {MAX_NAME_LEN} characters")]
    NameTooLong {
        /// Offending length.
        len: usize,
    },

    /// Description exceeds [`MAX_DESCRIPTION_LEN`].
    #[error("description too long: {len} > {MAX_DESCRIPTION_LEN} characters")]
    DescriptionTooLong {
        /// Offending length.
        len: usize,
    },

    /// Item quantity of zero.
    #[error("item quantity must be at least 1")]
    ZeroQuantity,
}
