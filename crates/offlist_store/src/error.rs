//! Error types for the store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the persistence backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A collection could not be encoded for persistence.
    #[error("encode error: {0}")]
    Encode(String),

    /// A persisted snapshot could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}
