//! Remote client abstraction.

use crate::error::EngineResult;
use offlist_model::{
    BulkOutcome, CallerId, Entity, EntityId, MutationOutcome, MutationToken, OperationType,
    VersionedRef,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A remote client speaks the concurrency-gate contract.
///
/// Transport-level failures (unreachable, timeout) surface as `Err`;
/// protocol outcomes, including rejections, surface as `Ok` values for
/// the driver to classify. Implementations enforce the bounded request
/// timeout themselves.
pub trait RemoteClient: Send + Sync {
    /// Creates a resource. The gate assigns the id.
    fn create(
        &self,
        caller: &CallerId,
        token: MutationToken,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome>;

    /// Replaces the mutable fields of a resource, conditional on version.
    fn update(
        &self,
        caller: &CallerId,
        token: MutationToken,
        id: EntityId,
        expected_version: u64,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome>;

    /// Deletes a resource, conditional on version.
    fn delete(
        &self,
        caller: &CallerId,
        token: MutationToken,
        id: EntityId,
        expected_version: u64,
    ) -> EngineResult<MutationOutcome>;

    /// Sets the completion flag on many items, version-checked per item.
    fn bulk_complete(
        &self,
        caller: &CallerId,
        refs: &[VersionedRef],
        completed: bool,
    ) -> EngineResult<Vec<BulkOutcome>>;

    /// Deletes many resources, version-checked per resource.
    fn bulk_delete(&self, caller: &CallerId, refs: &[VersionedRef])
        -> EngineResult<Vec<BulkOutcome>>;

    /// Rewrites item positions within a list. Last-write-wins remotely.
    fn reorder(
        &self,
        caller: &CallerId,
        list_id: EntityId,
        ordered: &[EntityId],
    ) -> EngineResult<Vec<BulkOutcome>>;

    /// Lists the icon catalog. Needs no caller identity.
    fn list_icons(&self) -> EngineResult<Vec<String>>;

    /// Liveness probe with a bounded timeout.
    ///
    /// Transport-level connectivity is necessary but not sufficient; this
    /// asks the service itself.
    fn is_reachable(&self) -> bool;
}

type CallHook = Box<dyn Fn() + Send + Sync>;

/// A scriptable remote for tests.
///
/// Without scripted outcomes every mutation echoes success: creates get a
/// fresh assigned id at version 1, updates come back at
/// `expected_version + 1`, deletes report removed. Scripted outcomes are
/// consumed front-to-back by the single-resource calls.
#[derive(Default)]
pub struct MockRemote {
    reachable: AtomicBool,
    scripted: Mutex<VecDeque<EngineResult<MutationOutcome>>>,
    calls: Mutex<Vec<(OperationType, EntityId)>>,
    on_call: Mutex<Option<CallHook>>,
}

impl MockRemote {
    /// Creates a reachable mock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            on_call: Mutex::new(None),
        }
    }

    /// Queues an outcome for the next single-resource call.
    pub fn script(&self, outcome: EngineResult<MutationOutcome>) {
        self.scripted.lock().push_back(outcome);
    }

    /// Sets reachability reported by the probe.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Installs a hook invoked at the start of every mutation call.
    pub fn set_on_call(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_call.lock() = Some(Box::new(hook));
    }

    /// Returns the log of mutation calls, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(OperationType, EntityId)> {
        self.calls.lock().clone()
    }

    fn record(&self, operation: OperationType, id: EntityId) {
        if let Some(hook) = &*self.on_call.lock() {
            hook();
        }
        self.calls.lock().push((operation, id));
    }

    fn next_scripted(&self) -> Option<EngineResult<MutationOutcome>> {
        self.scripted.lock().pop_front()
    }
}

impl RemoteClient for MockRemote {
    fn create(
        &self,
        caller: &CallerId,
        _token: MutationToken,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome> {
        self.record(OperationType::Create, entity.id);
        if let Some(outcome) = self.next_scripted() {
            return outcome;
        }
        let mut created = entity.clone();
        created.id = EntityId::assigned();
        created.version = 1;
        created.updated_by = caller.clone();
        Ok(MutationOutcome::Applied { entity: created })
    }

    fn update(
        &self,
        caller: &CallerId,
        _token: MutationToken,
        id: EntityId,
        expected_version: u64,
        entity: &Entity,
    ) -> EngineResult<MutationOutcome> {
        self.record(OperationType::Update, id);
        if let Some(outcome) = self.next_scripted() {
            return outcome;
        }
        let mut updated = entity.clone();
        updated.id = id;
        updated.version = expected_version + 1;
        updated.updated_by = caller.clone();
        Ok(MutationOutcome::Applied { entity: updated })
    }

    fn delete(
        &self,
        _caller: &CallerId,
        _token: MutationToken,
        id: EntityId,
        _expected_version: u64,
    ) -> EngineResult<MutationOutcome> {
        self.record(OperationType::Delete, id);
        if let Some(outcome) = self.next_scripted() {
            return outcome;
        }
        Ok(MutationOutcome::Removed)
    }

    fn bulk_complete(
        &self,
        _caller: &CallerId,
        refs: &[VersionedRef],
        _completed: bool,
    ) -> EngineResult<Vec<BulkOutcome>> {
        // The mock holds no records; bulk completes report missing.
        Ok(refs
            .iter()
            .map(|r| BulkOutcome {
                id: r.id,
                outcome: MutationOutcome::Missing,
            })
            .collect())
    }

    fn bulk_delete(
        &self,
        _caller: &CallerId,
        refs: &[VersionedRef],
    ) -> EngineResult<Vec<BulkOutcome>> {
        Ok(refs
            .iter()
            .map(|r| BulkOutcome {
                id: r.id,
                outcome: MutationOutcome::Removed,
            })
            .collect())
    }

    fn reorder(
        &self,
        _caller: &CallerId,
        _list_id: EntityId,
        ordered: &[EntityId],
    ) -> EngineResult<Vec<BulkOutcome>> {
        Ok(ordered
            .iter()
            .map(|id| BulkOutcome {
                id: *id,
                outcome: MutationOutcome::Missing,
            })
            .collect())
    }

    fn list_icons(&self) -> EngineResult<Vec<String>> {
        Ok(vec!["list".into(), "cart".into()])
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
