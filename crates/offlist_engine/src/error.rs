//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A remote operation exceeded its bounded timeout.
    #[error("operation timed out")]
    Timeout,

    /// The caller identity was rejected. Fatal for the request; the sync
    /// layer never retries it.
    #[error("unauthorized: caller identity rejected")]
    Unauthorized,

    /// Local input rejected before entering the queue.
    #[error("validation failed: {0}")]
    Validation(#[from] offlist_model::ValidationError),

    /// Durable store error.
    #[error("store error: {0}")]
    Store(#[from] offlist_store::StoreError),

    /// The remote answered with something the contract does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The drain was cancelled by an offline transition.
    #[error("sync cancelled")]
    Cancelled,
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    ///
    /// Timeouts count as transient, never as conflicts.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Timeout => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(EngineError::transport_retryable("connection reset").is_retryable());
        assert!(!EngineError::transport_fatal("tls failure").is_retryable());
        assert!(EngineError::Timeout.is_retryable());
        assert!(!EngineError::Unauthorized.is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
        assert!(!EngineError::Protocol("bad response".into()).is_retryable());
    }

    #[test]
    fn validation_converts_from_model() {
        let err: EngineError = offlist_model::ValidationError::EmptyName.into();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(EngineError::Timeout.to_string(), "operation timed out");
        let err = EngineError::transport_retryable("unreachable");
        assert_eq!(err.to_string(), "transport error: unreachable");
    }
}
