//! Caller-identity enforcement.
//!
//! Every request must carry a non-empty opaque caller identity, except
//! the onboarding/icon-listing calls. The identity is not verified
//! beyond presence; it feeds the audit fields on accepted mutations.

use crate::error::{GateError, GateResult};
use offlist_model::{CallerId, GateRequest};

/// Presence check for the caller identity, with exemptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPolicy;

impl IdentityPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Authorizes a request, returning the effective caller identity.
    ///
    /// Exempt requests without an identity are attributed to an
    /// anonymous caller.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::MissingIdentity`] for a non-exempt request
    /// without a usable identity.
    pub fn authorize(&self, request: &GateRequest) -> GateResult<CallerId> {
        match request.caller() {
            Some(caller) if !caller.is_empty() => Ok(caller.clone()),
            _ if request.is_auth_exempt() => Ok(CallerId::new("anonymous")),
            _ => Err(GateError::MissingIdentity),
        }
    }
}
