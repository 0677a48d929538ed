//! # offlist Gate Server
//!
//! Optimistic-concurrency gate for offlist.
//!
//! This crate provides:
//! - Per-entity compare-and-swap version enforcement
//! - Idempotency-token replay detection for drained mutations
//! - Bulk complete/delete with per-entity version checks
//! - The reorder endpoint (last-write-wins, no version guard)
//! - Caller-identity enforcement with an exemption list
//! - A tagged JSON dispatch facade usable as a loopback endpoint
//!
//! # Key Invariants
//!
//! - The gate is the sole consistency enforcement point: no other
//!   component may accept a stale-version mutation as successful
//! - An accepted mutation increments the entity version by exactly 1
//! - Deleting an absent resource succeeds (deletion is idempotent)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod gate;
mod handler;
mod server;

pub use auth::IdentityPolicy;
pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::VersionGate;
pub use handler::RequestHandler;
pub use server::GateServer;
