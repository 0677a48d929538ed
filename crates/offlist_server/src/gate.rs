//! Per-entity compare-and-swap version enforcement.

use offlist_model::{
    now_millis, BulkOutcome, CallerId, Entity, EntityId, EntityKind, MutationOutcome,
    MutationToken, VersionedRef,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::mem;

struct GateState {
    /// Authoritative records, keyed by assigned id.
    entities: HashMap<EntityId, Entity>,
    /// Outcomes of state-changing mutations, keyed by idempotency token.
    applied: HashMap<MutationToken, MutationOutcome>,
}

/// The authoritative version gate.
///
/// Update and delete requests carry the caller's believed version; the
/// gate performs an atomic conditional write keyed on (id, version).
/// Zero matches distinguish "resource absent" from "present with a
/// different version", the latter returning the current record. Accepted
/// mutations increment the version by exactly 1.
///
/// Tokens of accepted mutations are remembered, so a duplicate issuance
/// of a drained entry (a client retry after an interrupted drain) returns
/// the original outcome instead of applying twice.
pub struct VersionGate {
    state: RwLock<GateState>,
}

impl VersionGate {
    /// Creates an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GateState {
                entities: HashMap::new(),
                applied: HashMap::new(),
            }),
        }
    }

    /// Inserts a record as-is, bypassing the version check.
    ///
    /// Test seam for standing up server state that "another client"
    /// already pushed; the record must carry an assigned id.
    pub fn seed(&self, entity: Entity) {
        self.state.write().entities.insert(entity.id, entity);
    }

    /// Returns the current record for `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.state.read().entities.get(id).cloned()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entities.len()
    }

    /// Returns true if the gate holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entities.is_empty()
    }

    /// Creates a resource, assigning identity, version 1 and audit fields.
    pub fn create(&self, token: MutationToken, caller: &CallerId, entity: Entity) -> MutationOutcome {
        let mut state = self.state.write();
        if let Some(prev) = state.applied.get(&token) {
            return prev.clone();
        }
        if let Err(e) = entity.validate() {
            return MutationOutcome::Invalid {
                message: e.to_string(),
            };
        }

        let mut record = entity;
        record.id = EntityId::assigned();
        record.version = 1;
        record.updated_at = now_millis();
        record.updated_by = caller.clone();

        let outcome = MutationOutcome::Applied {
            entity: record.clone(),
        };
        state.entities.insert(record.id, record);
        state.applied.insert(token, outcome.clone());
        outcome
    }

    /// Replaces the mutable fields of a resource, conditional on version.
    pub fn update(
        &self,
        token: MutationToken,
        caller: &CallerId,
        id: EntityId,
        expected_version: u64,
        entity: Entity,
    ) -> MutationOutcome {
        let mut state = self.state.write();
        if let Some(prev) = state.applied.get(&token) {
            return prev.clone();
        }
        if let Err(e) = entity.validate() {
            return MutationOutcome::Invalid {
                message: e.to_string(),
            };
        }

        let current = match state.entities.get(&id) {
            None => return MutationOutcome::Missing,
            Some(current) => current,
        };
        if current.version != expected_version {
            tracing::debug!(
                %id,
                server = current.version,
                believed = expected_version,
                "rejecting stale update"
            );
            return MutationOutcome::Conflict {
                current: Some(current.clone()),
            };
        }
        if mem::discriminant(&current.kind) != mem::discriminant(&entity.kind) {
            return MutationOutcome::Invalid {
                message: "resource kind cannot change".into(),
            };
        }

        let mut record = entity;
        record.id = id;
        record.version = current.version + 1;
        record.updated_at = now_millis();
        record.updated_by = caller.clone();

        let outcome = MutationOutcome::Applied {
            entity: record.clone(),
        };
        state.entities.insert(id, record);
        state.applied.insert(token, outcome.clone());
        outcome
    }

    /// Deletes a resource, conditional on version.
    ///
    /// Deleting an absent resource succeeds: the end state matches the
    /// caller's intent.
    pub fn delete(
        &self,
        token: MutationToken,
        _caller: &CallerId,
        id: EntityId,
        expected_version: u64,
    ) -> MutationOutcome {
        let mut state = self.state.write();
        if let Some(prev) = state.applied.get(&token) {
            return prev.clone();
        }

        match state.entities.get(&id) {
            None => {
                state.applied.insert(token, MutationOutcome::Removed);
                MutationOutcome::Removed
            }
            Some(current) if current.version != expected_version => {
                tracing::debug!(
                    %id,
                    server = current.version,
                    believed = expected_version,
                    "rejecting stale delete"
                );
                MutationOutcome::Conflict {
                    current: Some(current.clone()),
                }
            }
            Some(_) => {
                state.entities.remove(&id);
                state.applied.insert(token, MutationOutcome::Removed);
                MutationOutcome::Removed
            }
        }
    }

    /// Sets the completion flag on many items, version-checked per item.
    pub fn bulk_complete(
        &self,
        caller: &CallerId,
        refs: &[VersionedRef],
        completed: bool,
    ) -> Vec<BulkOutcome> {
        let mut state = self.state.write();
        refs.iter()
            .map(|r| {
                let outcome = match state.entities.get(&r.id) {
                    None => MutationOutcome::Missing,
                    Some(current) if current.version != r.expected_version => {
                        MutationOutcome::Conflict {
                            current: Some(current.clone()),
                        }
                    }
                    Some(current) => match current.kind {
                        EntityKind::List { .. } => MutationOutcome::Invalid {
                            message: "only items carry a completion flag".into(),
                        },
                        EntityKind::Item { .. } => {
                            let mut record = current.clone();
                            if let EntityKind::Item { completed: c, .. } = &mut record.kind {
                                *c = completed;
                            }
                            record.version += 1;
                            record.updated_at = now_millis();
                            record.updated_by = caller.clone();
                            state.entities.insert(r.id, record.clone());
                            MutationOutcome::Applied { entity: record }
                        }
                    },
                };
                BulkOutcome { id: r.id, outcome }
            })
            .collect()
    }

    /// Deletes many resources, version-checked per resource.
    pub fn bulk_delete(&self, _caller: &CallerId, refs: &[VersionedRef]) -> Vec<BulkOutcome> {
        let mut state = self.state.write();
        refs.iter()
            .map(|r| {
                let outcome = match state.entities.get(&r.id) {
                    None => MutationOutcome::Removed,
                    Some(current) if current.version != r.expected_version => {
                        MutationOutcome::Conflict {
                            current: Some(current.clone()),
                        }
                    }
                    Some(_) => {
                        state.entities.remove(&r.id);
                        MutationOutcome::Removed
                    }
                };
                BulkOutcome { id: r.id, outcome }
            })
            .collect()
    }

    /// Rewrites item positions within a list, in the given order.
    ///
    /// Positions apply last-write-wins; there is no version guard on this
    /// path, so a concurrent reorder can be clobbered silently.
    pub fn reorder(
        &self,
        caller: &CallerId,
        list_id: EntityId,
        ordered: &[EntityId],
    ) -> Vec<BulkOutcome> {
        let mut state = self.state.write();
        ordered
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let outcome = match state.entities.get(id) {
                    None => MutationOutcome::Missing,
                    Some(current) => match current.kind {
                        EntityKind::Item { parent_id, .. } if parent_id == list_id => {
                            let mut record = current.clone();
                            record.position = index as u32;
                            record.version += 1;
                            record.updated_at = now_millis();
                            record.updated_by = caller.clone();
                            state.entities.insert(*id, record.clone());
                            MutationOutcome::Applied { entity: record }
                        }
                        _ => MutationOutcome::Invalid {
                            message: format!("{id} is not an item of {list_id}"),
                        },
                    },
                };
                BulkOutcome { id: *id, outcome }
            })
            .collect()
    }
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new()
    }
}
