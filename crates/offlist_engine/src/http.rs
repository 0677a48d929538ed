//! JSON transport plumbing.
//!
//! The actual HTTP client is abstracted behind [`HttpExchange`] so
//! different implementations (reqwest, ureq, an in-process loopback for
//! tests) can carry the same JSON contract. One `post` call is the
//! retried, timed-out request primitive the engine builds on.

use crate::error::{EngineError, EngineResult};
use crate::remote::RemoteClient;
use offlist_model::{
    BulkOutcome, CallerId, Entity, EntityId, GateRequest, GateResponse, MutationOutcome,
    MutationToken, VersionedRef,
};

/// Path of the gate's dispatch endpoint.
pub const GATE_PATH: &str = "/gate";

/// A single-request HTTP primitive.
///
/// Implementations own connection handling and the bounded per-request
/// timeout; a timeout surfaces as an `Err` and is treated as transient.
pub trait HttpExchange: Send + Sync {
    /// Sends one POST and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns a transport-level error message on failure.
    fn post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;

    /// Returns true if the service answered a liveness check recently.
    fn is_healthy(&self) -> bool;
}

/// A remote client speaking the JSON contract over an [`HttpExchange`].
pub struct JsonRemote<C: HttpExchange> {
    exchange: C,
}

impl<C: HttpExchange> JsonRemote<C> {
    /// Creates a client over the given exchange.
    pub fn new(exchange: C) -> Self {
        Self { exchange }
    }

    /// Returns the underlying exchange.
    pub fn exchange(&self) -> &C {
        &self.exchange
    }

    fn dispatch(&self, request: &GateRequest) -> EngineResult<GateResponse> {
        let body = serde_json::to_vec(request)
            .map_err(|e| EngineError::Protocol(format!("failed to encode request: {e}")))?;
        let response = self
            .exchange
            .post(GATE_PATH, &body)
            .map_err(EngineError::transport_retryable)?;
        serde_json::from_slice(&response)
            .map_err(|e| EngineError::Protocol(format!("failed to decode response: {e}")))
    }

    fn expect_mutation(&self, request: &GateRequest) -> EngineResult<MutationOutcome> {
        match self.dispatch(request)? {
            GateResponse::Mutation { outcome } => Ok(outcome),
            GateResponse::Error { message } => Err(EngineError::Protocol(message)),
            other => Err(EngineError::Protocol(format!(
                "unexpected response kind: {other:?}"
            ))),
        }
    }

    fn expect_bulk(&self, request: &GateRequest) -> EngineResult<Vec<BulkOutcome>> {
        match self.dispatch(request)? {
            GateResponse::Bulk { outcomes } => Ok(outcomes),
            GateResponse::Mutation {
                outcome: MutationOutcome::Unauthorized,
            } => Err(EngineError::Unauthorized),
            GateResponse::Error { message } => Err(EngineError::Protocol(message)),
            other => Err(EngineError::Protocol(format!(
                "unexpected response kind: {other:?}"
            ))),
        }
    }
}

impl<C: HttpExchange> RemoteClient for JsonRemote<C> {
    fn create(
        &self,
        caller: &CallerId,
        token: MutationToken,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome> {
        self.expect_mutation(&GateRequest::Create {
            caller: Some(caller.clone()),
            token,
            entity: entity.clone(),
        })
    }

    fn update(
        &self,
        caller: &CallerId,
        token: MutationToken,
        id: EntityId,
        expected_version: u64,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome> {
        self.expect_mutation(&GateRequest::Update {
            caller: Some(caller.clone()),
            token,
            id,
            expected_version,
            entity: entity.clone(),
        })
    }

    fn delete(
        &self,
        caller: &CallerId,
        token: MutationToken,
        id: EntityId,
        expected_version: u64,
    ) -> EngineResult<MutationOutcome> {
        self.expect_mutation(&GateRequest::Delete {
            caller: Some(caller.clone()),
            token,
            id,
            expected_version,
        })
    }

    fn bulk_complete(
        &self,
        caller: &CallerId,
        refs: &[VersionedRef],
        completed: bool,
    ) -> EngineResult<Vec<BulkOutcome>> {
        self.expect_bulk(&GateRequest::BulkComplete {
            caller: Some(caller.clone()),
            refs: refs.to_vec(),
            completed,
        })
    }

    fn bulk_delete(
        &self,
        caller: &CallerId,
        refs: &[VersionedRef],
    ) -> EngineResult<Vec<BulkOutcome>> {
        self.expect_bulk(&GateRequest::BulkDelete {
            caller: Some(caller.clone()),
            refs: refs.to_vec(),
        })
    }

    fn reorder(
        &self,
        caller: &CallerId,
        list_id: EntityId,
        ordered: &[EntityId],
    ) -> EngineResult<Vec<BulkOutcome>> {
        self.expect_bulk(&GateRequest::Reorder {
            caller: Some(caller.clone()),
            list_id,
            ordered: ordered.to_vec(),
        })
    }

    fn list_icons(&self) -> EngineResult<Vec<String>> {
        match self.dispatch(&GateRequest::ListIcons { caller: None })? {
            GateResponse::Icons { names } => Ok(names),
            GateResponse::Error { message } => Err(EngineError::Protocol(message)),
            other => Err(EngineError::Protocol(format!(
                "unexpected response kind: {other:?}"
            ))),
        }
    }

    fn is_reachable(&self) -> bool {
        self.exchange.is_healthy()
    }
}
