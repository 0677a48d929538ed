//! # offlist Engine
//!
//! Offline synchronization engine for offlist.
//!
//! This crate provides:
//! - The network monitor (transport signal + active liveness probe,
//!   edge-triggered subscriptions)
//! - The remote client abstraction with mock and JSON implementations
//! - The sync driver state machine (idle → draining → idle)
//! - The conflict classifier/resolver with auto-resolution rules
//! - The replica facade for validated optimistic local writes
//! - Bounded exponential backoff configuration
//!
//! ## Architecture
//!
//! User intent flows into the entity cache (optimistic write) and the
//! mutation queue (durable record of intent). When the monitor reports
//! the service reachable, the driver drains the queue strictly in order,
//! replaying each mutation against the concurrency gate. Successes update
//! the cache and leave the queue; rejections route through the conflict
//! resolver, which either auto-resolves (re-enqueue at the tail) or
//! surfaces a decision point.
//!
//! ## Key Invariants
//!
//! - One drain pass at a time; concurrent triggers coalesce
//! - Entries for one resource never replay out of order
//! - A conflict is never retried blindly
//! - A cached entity's version never regresses

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod error;
mod http;
mod monitor;
mod remote;
mod replica;
mod resolver;

pub use config::{BackoffConfig, EngineConfig};
pub use driver::{DrainReport, DriverEvent, DriverState, SyncDriver};
pub use error::{EngineError, EngineResult};
pub use http::{HttpExchange, JsonRemote};
pub use monitor::{NetworkEvent, NetworkMonitor, ProbeHandle, SubscriptionId};
pub use remote::{MockRemote, RemoteClient};
pub use replica::Replica;
pub use resolver::{ConflictResolver, RejectionHandling};
