//! Network reachability monitor.

use crate::remote::RemoteClient;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle identifying one registered subscriber.
pub type SubscriptionId = u64;

/// An edge-triggered reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The service became reachable.
    Online,
    /// The service became unreachable.
    Offline,
}

type Listener = Arc<dyn Fn(NetworkEvent) + Send + Sync>;

/// Tracks reachability of the remote service.
///
/// Two signals combine into the effective state: the transport-level
/// connectivity signal (fed by the host platform) and the result of the
/// periodic liveness probe — transport-level "online" is necessary but
/// not sufficient evidence the service answers. Subscribers are notified
/// synchronously on transitions only, outside the monitor's locks, so
/// delivery cannot re-enter the state-mutation path.
///
/// Monitors are plain constructed values; any number can coexist.
pub struct NetworkMonitor {
    transport_online: AtomicBool,
    service_reachable: AtomicBool,
    online: AtomicBool,
    transition: Mutex<()>,
    subscribers: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl NetworkMonitor {
    /// Creates a monitor that starts offline until evidence arrives.
    ///
    /// The transport is assumed up; the service counts as unreachable
    /// until the first successful probe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport_online: AtomicBool::new(true),
            service_reachable: AtomicBool::new(false),
            online: AtomicBool::new(false),
            transition: Mutex::new(()),
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Returns the current effective state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Registers a transition subscriber and returns its handle.
    pub fn subscribe(&self, listener: impl Fn(NetworkEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a subscriber. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Feeds the transport-level connectivity signal.
    pub fn set_transport_online(&self, online: bool) {
        self.transport_online.store(online, Ordering::SeqCst);
        self.recompute();
    }

    /// Feeds one liveness probe result.
    pub fn record_probe(&self, reachable: bool) {
        self.service_reachable.store(reachable, Ordering::SeqCst);
        self.recompute();
    }

    /// Runs one probe against the remote and feeds the result.
    pub fn probe_now(&self, remote: &dyn RemoteClient) -> bool {
        let reachable = remote.is_reachable();
        self.record_probe(reachable);
        reachable
    }

    /// Spawns a background prober with the given interval.
    ///
    /// The prober stops when the returned handle is stopped or dropped.
    pub fn start_probing(
        self: &Arc<Self>,
        remote: Arc<dyn RemoteClient>,
        interval: Duration,
    ) -> ProbeHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = Arc::clone(self);
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                monitor.probe_now(remote.as_ref());
                // Sleep in slices so stop requests are noticed promptly.
                let mut remaining = interval;
                let slice = Duration::from_millis(10);
                while remaining > Duration::ZERO && !stop_flag.load(Ordering::SeqCst) {
                    let step = remaining.min(slice);
                    thread::sleep(step);
                    remaining = remaining.saturating_sub(step);
                }
            }
        });

        ProbeHandle {
            stop,
            thread: Some(thread),
        }
    }

    fn recompute(&self) {
        let notify = {
            let _guard = self.transition.lock();
            let effective = self.transport_online.load(Ordering::SeqCst)
                && self.service_reachable.load(Ordering::SeqCst);
            let previous = self.online.swap(effective, Ordering::SeqCst);
            if previous == effective {
                None
            } else {
                let event = if effective {
                    NetworkEvent::Online
                } else {
                    NetworkEvent::Offline
                };
                tracing::info!(?event, "network transition");
                let listeners: Vec<Listener> = self
                    .subscribers
                    .read()
                    .iter()
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                Some((event, listeners))
            }
        };

        if let Some((event, listeners)) = notify {
            for listener in listeners {
                listener(event);
            }
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a background prober thread.
pub struct ProbeHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Stops the prober and waits for it to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use std::time::Instant;

    fn recording(monitor: &NetworkMonitor) -> (SubscriptionId, Arc<Mutex<Vec<NetworkEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = monitor.subscribe(move |event| sink.lock().push(event));
        (id, events)
    }

    #[test]
    fn starts_offline() {
        let monitor = NetworkMonitor::new();
        assert!(!monitor.is_online());
    }

    #[test]
    fn transitions_are_edge_triggered() {
        let monitor = NetworkMonitor::new();
        let (_, events) = recording(&monitor);

        // Transport alone is not enough.
        monitor.set_transport_online(true);
        assert!(events.lock().is_empty());

        monitor.record_probe(true);
        assert_eq!(*events.lock(), vec![NetworkEvent::Online]);

        // Level repeats do not re-fire.
        monitor.record_probe(true);
        monitor.set_transport_online(true);
        assert_eq!(events.lock().len(), 1);

        monitor.set_transport_online(false);
        assert_eq!(*events.lock(), vec![NetworkEvent::Online, NetworkEvent::Offline]);

        monitor.set_transport_online(false);
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn probe_failure_forces_offline() {
        let monitor = NetworkMonitor::new();
        monitor.set_transport_online(true);
        monitor.record_probe(true);
        assert!(monitor.is_online());

        monitor.record_probe(false);
        assert!(!monitor.is_online());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let monitor = NetworkMonitor::new();
        let (id, events) = recording(&monitor);

        assert!(monitor.unsubscribe(id));
        assert!(!monitor.unsubscribe(id));
        assert_eq!(monitor.subscriber_count(), 0);

        monitor.record_probe(true);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn probe_now_consults_remote() {
        let monitor = NetworkMonitor::new();
        let remote = MockRemote::new();

        assert!(monitor.probe_now(&remote));
        assert!(monitor.is_online());

        remote.set_reachable(false);
        assert!(!monitor.probe_now(&remote));
        assert!(!monitor.is_online());
    }

    #[test]
    fn background_prober_tracks_reachability() {
        let monitor = Arc::new(NetworkMonitor::new());
        let remote = Arc::new(MockRemote::new());
        let handle = monitor.start_probing(
            Arc::clone(&remote) as Arc<dyn RemoteClient>,
            Duration::from_millis(20),
        );

        let deadline = Instant::now() + Duration::from_secs(2);
        while !monitor.is_online() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(monitor.is_online());

        remote.set_reachable(false);
        let deadline = Instant::now() + Duration::from_secs(2);
        while monitor.is_online() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!monitor.is_online());

        handle.stop();
    }
}
