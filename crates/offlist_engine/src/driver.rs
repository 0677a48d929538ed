//! Sync driver state machine.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::monitor::{NetworkEvent, NetworkMonitor, SubscriptionId};
use crate::remote::RemoteClient;
use crate::resolver::{ConflictResolver, RejectionHandling};
use offlist_model::{
    EntityId, MutationOutcome, MutationToken, OperationType, QueueEntry, Resolution,
};
use offlist_store::{EntityCache, MutationQueue};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// The current state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No drain in progress.
    Idle,
    /// A drain pass is running.
    Draining,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Entries confirmed and removed from the queue.
    pub synced: usize,
    /// Entries parked as failed (transient or fatal).
    pub failed: usize,
    /// Conflicts surfaced for an explicit choice.
    pub conflicts: usize,
    /// Conflicts resolved automatically.
    pub auto_resolved: usize,
    /// Entries left pending because their resource was held back.
    pub skipped: usize,
    /// True if an offline transition aborted the pass.
    pub aborted: bool,
    /// Backoff delay before the next automatic requeue, when failed
    /// entries remain under the retry cap.
    pub retry_after: Option<Duration>,
}

/// Status event published to driver subscribers.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// The driver changed state.
    StateChanged(DriverState),
    /// An entry was confirmed by the remote.
    EntrySynced {
        /// The drained entry's token.
        token: MutationToken,
        /// The affected resource.
        resource_id: EntityId,
    },
    /// An entry failed and was parked.
    EntryFailed {
        /// The failed entry's token.
        token: MutationToken,
        /// The affected resource.
        resource_id: EntityId,
        /// Failure message.
        message: String,
    },
    /// A conflict was surfaced for an explicit choice.
    ConflictSurfaced {
        /// The conflict record awaiting resolution.
        record_id: Uuid,
        /// The affected resource.
        resource_id: EntityId,
    },
    /// A conflict was resolved automatically.
    ConflictAutoResolved {
        /// The affected resource.
        resource_id: EntityId,
        /// The strategy that was applied.
        resolution: Resolution,
    },
    /// A drain pass finished.
    DrainCompleted(DrainReport),
}

type Listener = Arc<dyn Fn(&DriverEvent) + Send + Sync>;

/// Orchestrates queue draining against the remote gate.
///
/// The driver holds no durable state of its own: every activation
/// recomputes its work from the mutation queue. One logical worker runs
/// at a time — a `request_drain` while a pass is active coalesces into
/// "drain again once the current pass finishes". Entries replay strictly
/// in queue order; within a pass, a resource whose entry failed or
/// conflicted holds back its later entries, and other resources proceed.
pub struct SyncDriver {
    cache: Arc<EntityCache>,
    queue: Arc<MutationQueue>,
    remote: Arc<dyn RemoteClient>,
    resolver: Arc<ConflictResolver>,
    config: EngineConfig,
    state: RwLock<DriverState>,
    drain_gate: Mutex<()>,
    rerun: AtomicBool,
    offline: AtomicBool,
    attempts: AtomicU32,
    subscribers: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl SyncDriver {
    /// Creates a driver over the replica's stores and a remote client.
    #[must_use]
    pub fn new(
        cache: Arc<EntityCache>,
        queue: Arc<MutationQueue>,
        remote: Arc<dyn RemoteClient>,
        resolver: Arc<ConflictResolver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            cache,
            queue,
            remote,
            resolver,
            config,
            state: RwLock::new(DriverState::Idle),
            drain_gate: Mutex::new(()),
            rerun: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        *self.state.read()
    }

    /// Returns the conflict resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<ConflictResolver> {
        Arc::clone(&self.resolver)
    }

    /// Entries not yet confirmed, for the presentation layer.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Conflicts awaiting an explicit choice, for the presentation layer.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.resolver.pending_count()
    }

    /// Registers a status subscriber and returns its handle.
    pub fn subscribe(&self, listener: impl Fn(&DriverEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a status subscriber. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Signals that the service became unreachable.
    ///
    /// An active pass finishes its in-flight operation and stops issuing
    /// new ones; entries left syncing recover as pending next drain.
    pub fn notify_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Wires the driver to a network monitor.
    ///
    /// Online transitions start a drain on a fresh thread; offline
    /// transitions cancel issuance.
    pub fn attach(self: &Arc<Self>, monitor: &NetworkMonitor) -> SubscriptionId {
        let driver = Arc::clone(self);
        monitor.subscribe(move |event| match event {
            NetworkEvent::Online => {
                let driver = Arc::clone(&driver);
                thread::spawn(move || {
                    if let Err(e) = driver.request_drain() {
                        tracing::warn!(error = %e, "drain after online transition failed");
                    }
                });
            }
            NetworkEvent::Offline => driver.notify_offline(),
        })
    }

    /// Requests a drain.
    ///
    /// Returns the final pass report, or `None` when another drain was
    /// already running — that drain will run one more pass before going
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; remote outcomes never
    /// propagate out of a pass.
    pub fn request_drain(&self) -> EngineResult<Option<DrainReport>> {
        let guard = match self.drain_gate.try_lock() {
            Some(guard) => guard,
            None => {
                self.rerun.store(true, Ordering::SeqCst);
                return Ok(None);
            }
        };

        let mut report = self.drain_pass()?;
        while self.rerun.swap(false, Ordering::SeqCst) {
            report = self.drain_pass()?;
        }
        drop(guard);
        Ok(Some(report))
    }

    /// Explicit trigger, e.g. from a pull-to-refresh.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures.
    pub fn force_sync(&self) -> EngineResult<Option<DrainReport>> {
        self.request_drain()
    }

    /// Resets failed entries to pending, e.g. from a scheduled retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted.
    pub fn requeue_failed(&self) -> EngineResult<usize> {
        Ok(self.queue.requeue_failed()?)
    }

    /// Spawns the backoff timer: after `delay`, failed entries requeue
    /// and a drain runs. Use the `retry_after` of a [`DrainReport`] as
    /// the delay.
    pub fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let driver = Arc::clone(self);
        thread::spawn(move || {
            thread::sleep(delay);
            match driver.requeue_failed() {
                Ok(0) => {}
                Ok(_) => {
                    if let Err(e) = driver.request_drain() {
                        tracing::warn!(error = %e, "scheduled retry drain failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "scheduled requeue failed"),
            }
        });
    }

    fn drain_pass(&self) -> EngineResult<DrainReport> {
        self.set_state(DriverState::Draining);
        self.offline.store(false, Ordering::SeqCst);

        self.queue.reset_syncing()?;
        let snapshot = self.queue.list_pending();
        let mut blocked = self.resolver.pending_resource_ids();
        let mut report = DrainReport::default();

        tracing::info!(entries = snapshot.len(), "drain pass started");

        for stale in snapshot {
            if self.offline.load(Ordering::SeqCst) {
                tracing::info!("offline transition observed, aborting drain");
                report.aborted = true;
                break;
            }
            // Re-read the entry: earlier work in this pass may have
            // rewritten its ids (create substitution) or removed it
            // (auto-resolution).
            let entry = match self.queue.get(stale.id) {
                Some(entry) if entry.is_pending() => entry,
                _ => continue,
            };
            if blocked.contains(&entry.resource_id) {
                report.skipped += 1;
                continue;
            }

            self.queue.mark_syncing(entry.id)?;
            match self.execute(&entry) {
                Ok(outcome) => {
                    self.apply_outcome(&entry, outcome, &mut blocked, &mut report)?;
                }
                Err(e) => {
                    // Transient or fatal transport failure: park the entry
                    // and hold back its resource, keep the queue moving.
                    self.queue.mark_failed(entry.id, e.to_string())?;
                    blocked.insert(entry.resource_id);
                    report.failed += 1;
                    self.emit(&DriverEvent::EntryFailed {
                        token: entry.id,
                        resource_id: entry.resource_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        if report.failed > 0 {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < self.config.backoff.max_attempts {
                report.retry_after = Some(self.config.backoff.delay_for_attempt(attempt));
            }
        } else {
            self.attempts.store(0, Ordering::SeqCst);
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            conflicts = report.conflicts,
            skipped = report.skipped,
            aborted = report.aborted,
            "drain pass finished"
        );

        self.set_state(DriverState::Idle);
        self.emit(&DriverEvent::DrainCompleted(report.clone()));
        Ok(report)
    }

    fn execute(&self, entry: &QueueEntry) -> EngineResult<MutationOutcome> {
        let caller = &self.config.caller;
        match entry.operation {
            OperationType::Create => {
                let payload = entry
                    .payload
                    .as_ref()
                    .ok_or_else(|| EngineError::Protocol("create entry without payload".into()))?;
                self.remote.create(caller, entry.id, payload)
            }
            OperationType::Update => {
                let payload = entry
                    .payload
                    .as_ref()
                    .ok_or_else(|| EngineError::Protocol("update entry without payload".into()))?;
                self.remote.update(
                    caller,
                    entry.id,
                    entry.resource_id,
                    entry.expected_version,
                    payload,
                )
            }
            OperationType::Delete => {
                self.remote
                    .delete(caller, entry.id, entry.resource_id, entry.expected_version)
            }
        }
    }

    fn apply_outcome(
        &self,
        entry: &QueueEntry,
        outcome: MutationOutcome,
        blocked: &mut HashSet<EntityId>,
        report: &mut DrainReport,
    ) -> EngineResult<()> {
        match outcome {
            MutationOutcome::Applied { entity } => {
                if entry.operation == OperationType::Create && entry.resource_id.is_temporary() {
                    // Swap the optimistic placeholder for the assigned id,
                    // in the cache and in every later queue entry.
                    self.cache.remove(&entry.resource_id)?;
                    self.queue.reassign_resource(entry.resource_id, entity.id)?;
                }
                let resource_id = entity.id;
                self.cache.apply_remote(entity)?;
                self.queue.mark_synced(entry.id)?;
                report.synced += 1;
                self.emit(&DriverEvent::EntrySynced {
                    token: entry.id,
                    resource_id,
                });
            }
            MutationOutcome::Removed => {
                self.cache.remove(&entry.resource_id)?;
                self.queue.mark_synced(entry.id)?;
                report.synced += 1;
                self.emit(&DriverEvent::EntrySynced {
                    token: entry.id,
                    resource_id: entry.resource_id,
                });
            }
            MutationOutcome::Missing if entry.is_delete() => {
                // The resource is gone, which is what the delete wanted.
                self.cache.remove(&entry.resource_id)?;
                self.queue.mark_synced(entry.id)?;
                report.synced += 1;
                self.emit(&DriverEvent::EntrySynced {
                    token: entry.id,
                    resource_id: entry.resource_id,
                });
            }
            MutationOutcome::Conflict { current } => {
                self.handle_rejection(entry, current, "version_conflict", blocked, report)?;
            }
            MutationOutcome::Missing => {
                self.handle_rejection(entry, None, "resource not found", blocked, report)?;
            }
            MutationOutcome::Unauthorized => {
                self.queue.mark_failed(entry.id, "unauthorized")?;
                blocked.insert(entry.resource_id);
                report.failed += 1;
                self.emit(&DriverEvent::EntryFailed {
                    token: entry.id,
                    resource_id: entry.resource_id,
                    message: "unauthorized".into(),
                });
            }
            MutationOutcome::Invalid { message } => {
                self.queue.mark_failed(entry.id, message.clone())?;
                blocked.insert(entry.resource_id);
                report.failed += 1;
                self.emit(&DriverEvent::EntryFailed {
                    token: entry.id,
                    resource_id: entry.resource_id,
                    message,
                });
            }
        }
        Ok(())
    }

    fn handle_rejection(
        &self,
        entry: &QueueEntry,
        server: Option<offlist_model::Entity>,
        message: &str,
        blocked: &mut HashSet<EntityId>,
        report: &mut DrainReport,
    ) -> EngineResult<()> {
        // Either way the resource sits out the rest of this pass; the
        // rewritten intent drains with fresh state next time.
        blocked.insert(entry.resource_id);
        match self.resolver.handle_rejection(entry, server, message)? {
            RejectionHandling::Auto(resolution) => {
                report.auto_resolved += 1;
                self.emit(&DriverEvent::ConflictAutoResolved {
                    resource_id: entry.resource_id,
                    resolution,
                });
            }
            RejectionHandling::Surfaced(record_id) => {
                self.queue.mark_failed(entry.id, message)?;
                report.conflicts += 1;
                self.emit(&DriverEvent::ConflictSurfaced {
                    record_id,
                    resource_id: entry.resource_id,
                });
            }
        }
        Ok(())
    }

    fn set_state(&self, state: DriverState) {
        *self.state.write() = state;
        self.emit(&DriverEvent::StateChanged(state));
    }

    fn emit(&self, event: &DriverEvent) {
        let listeners: Vec<Listener> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffConfig;
    use crate::remote::MockRemote;
    use offlist_model::{CallerId, Entity, EntryStatus, ResourceType};

    struct Fixture {
        cache: Arc<EntityCache>,
        queue: Arc<MutationQueue>,
        remote: Arc<MockRemote>,
        driver: Arc<SyncDriver>,
    }

    fn fixture() -> Fixture {
        fixture_with_backoff(BackoffConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
        })
    }

    fn fixture_with_backoff(backoff: BackoffConfig) -> Fixture {
        let cache = Arc::new(EntityCache::in_memory());
        let queue = Arc::new(MutationQueue::in_memory());
        let remote = Arc::new(MockRemote::new());
        let resolver = Arc::new(ConflictResolver::new(Arc::clone(&cache), Arc::clone(&queue)));
        let config = EngineConfig::new(CallerId::new("device-1")).with_backoff(backoff);
        let driver = Arc::new(SyncDriver::new(
            Arc::clone(&cache),
            Arc::clone(&queue),
            Arc::clone(&remote) as Arc<dyn RemoteClient>,
            resolver,
            config,
        ));
        Fixture {
            cache,
            queue,
            remote,
            driver,
        }
    }

    fn caller() -> CallerId {
        CallerId::new("device-1")
    }

    fn enqueue_create(f: &Fixture, name: &str) -> QueueEntry {
        let entity = Entity::new_list(name, caller());
        f.cache.put(entity.clone()).unwrap();
        f.queue
            .enqueue(
                OperationType::Create,
                ResourceType::List,
                entity.id,
                Some(entity),
                1,
                None,
            )
            .unwrap()
    }

    fn enqueue_update(f: &Fixture, id: EntityId, name: &str) -> QueueEntry {
        let mut entity = Entity::new_list(name, caller());
        entity.id = id;
        f.queue
            .enqueue(
                OperationType::Update,
                ResourceType::List,
                id,
                Some(entity),
                1,
                None,
            )
            .unwrap()
    }

    #[test]
    fn drain_substitutes_temporary_ids() {
        let f = fixture();
        let entry = enqueue_create(&f, "Groceries");
        let temp_id = entry.resource_id;

        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.synced, 1);
        assert!(f.queue.is_empty());

        // The temporary id is gone; exactly one assigned record remains.
        assert_eq!(f.cache.get(&temp_id), None);
        assert_eq!(f.cache.len(), 1);
        let lists = f.cache.get_all_by_parent(None);
        assert!(lists[0].id.is_assigned());
        assert_eq!(lists[0].version, 1);
        assert_eq!(f.driver.state(), DriverState::Idle);
    }

    #[test]
    fn transient_failure_blocks_same_resource_only() {
        let f = fixture();
        let resource = EntityId::assigned();
        let first = enqueue_update(&f, resource, "First");
        let second = enqueue_update(&f, resource, "Second");
        let other = enqueue_update(&f, EntityId::assigned(), "Other");

        f.remote.script(Err(EngineError::Timeout));
        let report = f.driver.request_drain().unwrap().unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.synced, 1);

        assert_eq!(f.queue.get(first.id).unwrap().status, EntryStatus::Failed);
        assert_eq!(f.queue.get(second.id).unwrap().status, EntryStatus::Pending);
        assert!(f.queue.get(other.id).is_none());

        // Only two calls went out: the failing first and the other resource.
        assert_eq!(f.remote.calls().len(), 2);
    }

    #[test]
    fn conflict_holds_back_pending_delete() {
        let f = fixture();
        let resource = EntityId::assigned();
        let mut local = Entity::new_list("Local", caller());
        local.id = resource;
        f.cache.put(local.clone()).unwrap();

        enqueue_update(&f, resource, "Local");
        f.queue
            .enqueue(
                OperationType::Delete,
                ResourceType::List,
                resource,
                None,
                1,
                None,
            )
            .unwrap();
        assert!(f.queue.has_pending_delete(ResourceType::List, resource));

        // The server diverged: different content at version 2.
        let mut server = local.clone();
        server.version = 2;
        server.name = "Server".into();
        f.remote.script(Ok(MutationOutcome::Conflict {
            current: Some(server),
        }));

        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.skipped, 1);

        // The delete never went out and is still queued.
        assert_eq!(f.remote.calls().len(), 1);
        assert!(f.queue.has_pending_delete(ResourceType::List, resource));
        assert_eq!(f.driver.conflict_count(), 1);
    }

    #[test]
    fn failed_pass_reports_backoff_until_cap() {
        let f = fixture_with_backoff(BackoffConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
        });
        let resource = EntityId::assigned();
        enqueue_update(&f, resource, "First");

        f.remote.script(Err(EngineError::Timeout));
        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.retry_after, Some(Duration::from_millis(100)));

        f.driver.requeue_failed().unwrap();
        f.remote.script(Err(EngineError::Timeout));
        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.retry_after, Some(Duration::from_millis(200)));

        // Third failure reaches the cap: no more automatic retries.
        f.driver.requeue_failed().unwrap();
        f.remote.script(Err(EngineError::Timeout));
        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.retry_after, None);
    }

    #[test]
    fn clean_pass_resets_backoff() {
        let f = fixture();
        let resource = EntityId::assigned();
        enqueue_update(&f, resource, "First");

        f.remote.script(Err(EngineError::Timeout));
        f.driver.request_drain().unwrap().unwrap();

        f.driver.requeue_failed().unwrap();
        let report = f.driver.request_drain().unwrap().unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(f.driver.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn offline_transition_aborts_remaining_issuance() {
        let f = fixture();
        enqueue_update(&f, EntityId::assigned(), "First");
        enqueue_update(&f, EntityId::assigned(), "Second");

        // The first remote call flips the driver offline mid-drain.
        let driver = Arc::clone(&f.driver);
        let fired = Arc::new(AtomicBool::new(false));
        f.remote.set_on_call(move || {
            if !fired.swap(true, Ordering::SeqCst) {
                driver.notify_offline();
            }
        });

        let report = f.driver.request_drain().unwrap().unwrap();
        assert!(report.aborted);
        // The in-flight operation completed; the second was never issued.
        assert_eq!(report.synced, 1);
        assert_eq!(f.remote.calls().len(), 1);
        assert_eq!(f.queue.pending_count(), 1);
        assert_eq!(f.driver.state(), DriverState::Idle);
    }

    #[test]
    fn concurrent_triggers_coalesce_into_one_more_pass() {
        let f = fixture();
        enqueue_update(&f, EntityId::assigned(), "First");

        // Slow every remote call down so the second trigger overlaps.
        f.remote.set_on_call(|| thread::sleep(Duration::from_millis(50)));

        let driver = Arc::clone(&f.driver);
        let background = thread::spawn(move || driver.request_drain().unwrap());

        thread::sleep(Duration::from_millis(15));
        enqueue_update(&f, EntityId::assigned(), "Second");
        // Coalesced: the running drain picks this up in one more pass.
        let coalesced = f.driver.request_drain().unwrap();
        assert!(coalesced.is_none());

        let report = background.join().unwrap().unwrap();
        assert!(report.synced >= 1);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn status_events_cover_the_pass() {
        let f = fixture();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        f.driver.subscribe(move |event| {
            sink.lock().push(format!("{event:?}"));
        });

        enqueue_create(&f, "Groceries");
        f.driver.request_drain().unwrap().unwrap();

        let log = events.lock();
        assert!(log.iter().any(|e| e.contains("Draining")));
        assert!(log.iter().any(|e| e.contains("EntrySynced")));
        assert!(log.iter().any(|e| e.contains("DrainCompleted")));
    }

    #[test]
    fn scheduled_retry_requeues_and_drains() {
        let f = fixture();
        enqueue_update(&f, EntityId::assigned(), "First");

        f.remote.script(Err(EngineError::Timeout));
        let report = f.driver.request_drain().unwrap().unwrap();
        let delay = report.retry_after.unwrap();
        assert_eq!(f.queue.failed_count(), 1);

        f.driver.schedule_retry(delay);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !f.queue.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(f.queue.is_empty());
    }

    #[test]
    fn unauthorized_parks_entry_without_retry_in_pass() {
        let f = fixture();
        let entry = enqueue_update(&f, EntityId::assigned(), "First");

        f.remote.script(Ok(MutationOutcome::Unauthorized));
        let report = f.driver.request_drain().unwrap().unwrap();

        assert_eq!(report.failed, 1);
        let stored = f.queue.get(entry.id).unwrap();
        assert_eq!(stored.status, EntryStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("unauthorized"));
        assert_eq!(f.remote.calls().len(), 1);
    }
}
