//! Gate server facade.

use crate::config::GateConfig;
use crate::gate::VersionGate;
use crate::handler::RequestHandler;
use offlist_model::{GateRequest, GateResponse};
use std::sync::Arc;

/// The gate server.
///
/// Wraps the version gate behind the typed handler and exposes a tagged
/// JSON dispatch, so the whole contract can be served from one POST route
/// or used as an in-process loopback endpoint in tests.
pub struct GateServer {
    handler: RequestHandler,
    gate: Arc<VersionGate>,
}

impl GateServer {
    /// Creates a server with a fresh gate.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self::with_gate(config, Arc::new(VersionGate::new()))
    }

    /// Creates a server over an existing gate.
    #[must_use]
    pub fn with_gate(config: GateConfig, gate: Arc<VersionGate>) -> Self {
        let handler = RequestHandler::new(config, Arc::clone(&gate));
        Self { handler, gate }
    }

    /// Returns the underlying gate.
    #[must_use]
    pub fn gate(&self) -> Arc<VersionGate> {
        Arc::clone(&self.gate)
    }

    /// Handles one typed request.
    pub fn handle(&self, request: GateRequest) -> GateResponse {
        self.handler.handle(request)
    }

    /// Handles one JSON-encoded request and returns the JSON response.
    ///
    /// Undecodable input maps to a [`GateResponse::Error`], never a
    /// transport failure.
    pub fn handle_json(&self, body: &[u8]) -> Vec<u8> {
        let response = match serde_json::from_slice::<GateRequest>(body) {
            Ok(request) => self.handle(request),
            Err(e) => GateResponse::Error {
                message: format!("undecodable request: {e}"),
            },
        };
        serde_json::to_vec(&response).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to encode response");
            br#"{"kind":"error","message":"response encoding failed"}"#.to_vec()
        })
    }
}
