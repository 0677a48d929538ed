//! Wire contract spoken to the concurrency gate.
//!
//! Conceptually one HTTP/JSON endpoint per operation; the tagged
//! [`GateRequest`]/[`GateResponse`] envelope lets a single POST route (or
//! an in-process loopback) dispatch all of them.

use crate::entity::{CallerId, Entity};
use crate::id::EntityId;
use crate::queue::MutationToken;
use serde::{Deserialize, Serialize};

/// A resource reference plus the version the caller believes is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRef {
    /// The referenced resource.
    pub id: EntityId,
    /// The caller's believed version.
    pub expected_version: u64,
}

/// A request to the gate.
///
/// `caller` is `None` when the identity header was absent; every variant
/// except `ListIcons` is rejected without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GateRequest {
    /// Create a resource. The entity carries a temporary id.
    Create {
        /// Caller identity.
        caller: Option<CallerId>,
        /// Idempotency token of the queued mutation.
        token: MutationToken,
        /// The record to create.
        entity: Entity,
    },
    /// Replace the mutable fields of a resource.
    Update {
        /// Caller identity.
        caller: Option<CallerId>,
        /// Idempotency token of the queued mutation.
        token: MutationToken,
        /// Target resource.
        id: EntityId,
        /// The caller's believed version.
        expected_version: u64,
        /// Full replacement field set.
        entity: Entity,
    },
    /// Delete a resource. Deleting an absent resource succeeds.
    Delete {
        /// Caller identity.
        caller: Option<CallerId>,
        /// Idempotency token of the queued mutation.
        token: MutationToken,
        /// Target resource.
        id: EntityId,
        /// The caller's believed version.
        expected_version: u64,
    },
    /// Set the completion flag on many items, version-checked per item.
    BulkComplete {
        /// Caller identity.
        caller: Option<CallerId>,
        /// Targets with believed versions.
        refs: Vec<VersionedRef>,
        /// The flag value to apply.
        completed: bool,
    },
    /// Delete many resources, version-checked per resource.
    BulkDelete {
        /// Caller identity.
        caller: Option<CallerId>,
        /// Targets with believed versions.
        refs: Vec<VersionedRef>,
    },
    /// Rewrite item positions within a list. Applied last-write-wins;
    /// positions carry no version guard.
    Reorder {
        /// Caller identity.
        caller: Option<CallerId>,
        /// The list whose items are reordered.
        list_id: EntityId,
        /// Item ids in their new order.
        ordered: Vec<EntityId>,
    },
    /// List the icon catalog. Exempt from the identity requirement.
    ListIcons {
        /// Caller identity, optional here.
        caller: Option<CallerId>,
    },
}

impl GateRequest {
    /// Returns the caller identity carried by the request.
    #[must_use]
    pub fn caller(&self) -> Option<&CallerId> {
        match self {
            Self::Create { caller, .. }
            | Self::Update { caller, .. }
            | Self::Delete { caller, .. }
            | Self::BulkComplete { caller, .. }
            | Self::BulkDelete { caller, .. }
            | Self::Reorder { caller, .. }
            | Self::ListIcons { caller } => caller.as_ref(),
        }
    }

    /// Returns true if the request may proceed without a caller identity.
    #[must_use]
    pub fn is_auth_exempt(&self) -> bool {
        matches!(self, Self::ListIcons { .. })
    }
}

/// Outcome of one mutation against one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The mutation was accepted; the authoritative record follows.
    Applied {
        /// The record as the server now holds it.
        entity: Entity,
    },
    /// The resource is gone, which satisfies a delete.
    Removed,
    /// The believed version no longer matches the server's.
    Conflict {
        /// The server's current record, absent when deleted remotely.
        current: Option<Entity>,
    },
    /// The resource does not exist (update against an absent id).
    Missing,
    /// The identity requirement was not met.
    Unauthorized,
    /// The request was malformed or over limits.
    Invalid {
        /// Human-readable reason.
        message: String,
    },
}

impl MutationOutcome {
    /// Returns true for the version-conflict outcome.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The HTTP status this outcome maps to on the wire.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Applied { entity } if entity.version == 1 => 201,
            Self::Applied { .. } => 200,
            Self::Removed => 204,
            Self::Conflict { .. } => 409,
            Self::Missing => 404,
            Self::Unauthorized => 401,
            Self::Invalid { .. } => 400,
        }
    }
}

/// Per-resource outcome within a bulk response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// The affected resource.
    pub id: EntityId,
    /// What happened to it.
    pub outcome: MutationOutcome,
}

/// A response from the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateResponse {
    /// Outcome of a single-resource mutation.
    Mutation {
        /// The outcome.
        outcome: MutationOutcome,
    },
    /// Per-resource outcomes of a bulk operation, in request order.
    Bulk {
        /// One outcome per requested resource.
        outcomes: Vec<BulkOutcome>,
    },
    /// The icon catalog.
    Icons {
        /// Available icon names.
        names: Vec<String>,
    },
    /// The request could not be decoded or dispatched.
    Error {
        /// Human-readable reason.
        message: String,
    },
}
