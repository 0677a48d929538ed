//! Typed request handling for the gate.

use crate::auth::IdentityPolicy;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::gate::VersionGate;
use offlist_model::{GateRequest, GateResponse, MutationOutcome};
use std::sync::Arc;

/// Dispatches authorized requests to the version gate.
pub struct RequestHandler {
    config: GateConfig,
    policy: IdentityPolicy,
    gate: Arc<VersionGate>,
}

impl RequestHandler {
    /// Creates a handler over a shared gate.
    #[must_use]
    pub fn new(config: GateConfig, gate: Arc<VersionGate>) -> Self {
        Self {
            config,
            policy: IdentityPolicy::new(),
            gate,
        }
    }

    /// Handles one request.
    pub fn handle(&self, request: GateRequest) -> GateResponse {
        let caller = match self.policy.authorize(&request) {
            Ok(caller) => caller,
            Err(GateError::MissingIdentity) => {
                tracing::info!("rejecting request without caller identity");
                return GateResponse::Mutation {
                    outcome: MutationOutcome::Unauthorized,
                };
            }
            Err(e) => {
                return GateResponse::Error {
                    message: e.to_string(),
                }
            }
        };

        match request {
            GateRequest::Create { token, entity, .. } => GateResponse::Mutation {
                outcome: self.gate.create(token, &caller, entity),
            },
            GateRequest::Update {
                token,
                id,
                expected_version,
                entity,
                ..
            } => GateResponse::Mutation {
                outcome: self.gate.update(token, &caller, id, expected_version, entity),
            },
            GateRequest::Delete {
                token,
                id,
                expected_version,
                ..
            } => GateResponse::Mutation {
                outcome: self.gate.delete(token, &caller, id, expected_version),
            },
            GateRequest::BulkComplete {
                refs, completed, ..
            } => match self.check_batch(refs.len()) {
                Err(response) => response,
                Ok(()) => GateResponse::Bulk {
                    outcomes: self.gate.bulk_complete(&caller, &refs, completed),
                },
            },
            GateRequest::BulkDelete { refs, .. } => match self.check_batch(refs.len()) {
                Err(response) => response,
                Ok(()) => GateResponse::Bulk {
                    outcomes: self.gate.bulk_delete(&caller, &refs),
                },
            },
            GateRequest::Reorder {
                list_id, ordered, ..
            } => match self.check_batch(ordered.len()) {
                Err(response) => response,
                Ok(()) => GateResponse::Bulk {
                    outcomes: self.gate.reorder(&caller, list_id, &ordered),
                },
            },
            GateRequest::ListIcons { .. } => GateResponse::Icons {
                names: self.config.icons.clone(),
            },
        }
    }

    fn check_batch(&self, len: usize) -> Result<(), GateResponse> {
        if len > self.config.max_bulk {
            let err = GateError::BatchTooLarge {
                len,
                max: self.config.max_bulk,
            };
            Err(GateResponse::Error {
                message: err.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offlist_model::{CallerId, Entity, EntityId, MutationToken, VersionedRef};

    fn handler() -> RequestHandler {
        RequestHandler::new(GateConfig::default(), Arc::new(VersionGate::new()))
    }

    fn caller() -> Option<CallerId> {
        Some(CallerId::new("device-1"))
    }

    #[test]
    fn create_roundtrip() {
        let handler = handler();
        let response = handler.handle(GateRequest::Create {
            caller: caller(),
            token: MutationToken::new(),
            entity: Entity::new_list("Groceries", CallerId::new("device-1")),
        });
        match response {
            GateResponse::Mutation {
                outcome: MutationOutcome::Applied { entity },
            } => {
                assert!(entity.id.is_assigned());
                assert_eq!(entity.version, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_without_identity() {
        let handler = handler();
        let response = handler.handle(GateRequest::Delete {
            caller: None,
            token: MutationToken::new(),
            id: EntityId::assigned(),
            expected_version: 1,
        });
        assert_eq!(
            response,
            GateResponse::Mutation {
                outcome: MutationOutcome::Unauthorized
            }
        );
    }

    #[test]
    fn icon_listing_needs_no_identity() {
        let handler = handler();
        let response = handler.handle(GateRequest::ListIcons { caller: None });
        match response {
            GateResponse::Icons { names } => assert!(!names.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let handler = RequestHandler::new(
            GateConfig::default().with_max_bulk(2),
            Arc::new(VersionGate::new()),
        );
        let refs: Vec<VersionedRef> = (0..3)
            .map(|_| VersionedRef {
                id: EntityId::assigned(),
                expected_version: 1,
            })
            .collect();
        let response = handler.handle(GateRequest::BulkDelete {
            caller: caller(),
            refs,
        });
        assert!(matches!(response, GateResponse::Error { .. }));
    }
}
