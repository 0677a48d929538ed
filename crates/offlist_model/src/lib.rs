//! # offlist Model
//!
//! Shared data model and wire protocol for offlist.
//!
//! This crate provides:
//! - Typed entity identity (temporary vs. server-assigned)
//! - List/item entity records with monotonic versions and audit fields
//! - Durable mutation-queue entries and their status lifecycle
//! - Conflict records and resolution strategies
//! - The JSON request/response contract spoken to the concurrency gate
//!
//! ## Key Invariants
//!
//! - An entity's `version` starts at 1 and moves forward by exactly 1 per
//!   accepted remote mutation
//! - Queue entries for one resource keep their relative insertion order
//! - A mutation token identifies one queued intent for its whole life,
//!   including server-side replay detection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod entity;
mod id;
mod messages;
mod queue;

pub use conflict::{ConflictKind, ConflictRecord, Resolution};
pub use entity::{
    merge_preferring_newer, now_millis, CallerId, Entity, EntityKind, ResourceType, Timestamp,
    ValidationError, MAX_DESCRIPTION_LEN, MAX_NAME_LEN,
};
pub use id::EntityId;
pub use messages::{BulkOutcome, GateRequest, GateResponse, MutationOutcome, VersionedRef};
pub use queue::{EntryStatus, MutationToken, OperationType, QueueEntry};
