//! Typed entity identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a list or item.
///
/// Records created while offline carry a `Temporary` id minted by the
/// client; the concurrency gate mints an `Assigned` id when the create
/// drains. Keeping the two as distinct variants makes the sync driver's
/// id-substitution step type-checked instead of a string-prefix
/// convention.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Client-minted placeholder for a record the server has not seen yet.
    Temporary(Uuid),
    /// Server-assigned identity.
    Assigned(Uuid),
}

impl EntityId {
    /// Mints a fresh temporary id for an offline-created record.
    #[must_use]
    pub fn temporary() -> Self {
        Self::Temporary(Uuid::new_v4())
    }

    /// Mints a fresh assigned id. Only the gate should call this.
    #[must_use]
    pub fn assigned() -> Self {
        Self::Assigned(Uuid::new_v4())
    }

    /// Returns true if this id is a client-side placeholder.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Returns true if this id was assigned by the server.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Temporary(u) | Self::Assigned(u) => *u,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(u) => write!(f, "EntityId(temp:{u})"),
            Self::Assigned(u) => write!(f, "EntityId({u})"),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(u) => write!(f, "temp:{u}"),
            Self::Assigned(u) => write!(f, "{u}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        assert_ne!(EntityId::temporary(), EntityId::temporary());
        assert_ne!(EntityId::assigned(), EntityId::assigned());
    }

    #[test]
    fn variant_checks() {
        let temp = EntityId::temporary();
        assert!(temp.is_temporary());
        assert!(!temp.is_assigned());

        let assigned = EntityId::assigned();
        assert!(assigned.is_assigned());
        assert!(!assigned.is_temporary());
    }

    #[test]
    fn same_uuid_different_variant_differs() {
        let u = Uuid::new_v4();
        assert_ne!(EntityId::Temporary(u), EntityId::Assigned(u));
        assert_eq!(EntityId::Temporary(u).uuid(), EntityId::Assigned(u).uuid());
    }

    #[test]
    fn display_marks_temporaries() {
        let u = Uuid::new_v4();
        assert!(EntityId::Temporary(u).to_string().starts_with("temp:"));
        assert_eq!(EntityId::Assigned(u).to_string(), u.to_string());
    }

    #[test]
    fn serde_roundtrip() {
        let id = EntityId::temporary();
        let json = serde_json::to_string(&id).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
