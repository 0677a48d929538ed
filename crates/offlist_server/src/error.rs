//! Error types for the gate server.

use thiserror::Error;

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Errors that can occur while handling gate requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    /// The request carried no caller identity and is not exempt.
    #[error("missing caller identity")]
    MissingIdentity,

    /// A bulk request exceeded the configured batch limit.
    #[error("batch too large: {len} > {max}")]
    BatchTooLarge {
        /// Requested batch size.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The request was structurally invalid.
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            GateError::MissingIdentity.to_string(),
            "missing caller identity"
        );
        let err = GateError::BatchTooLarge { len: 500, max: 100 };
        assert!(err.to_string().contains("500"));
    }
}
