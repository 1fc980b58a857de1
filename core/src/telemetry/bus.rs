use crate::snapshot::TelemetrySnapshot;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, Weak};

type Observer = Arc<Mutex<Box<dyn FnMut(&TelemetrySnapshot) + Send>>>;

struct Registry {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
    latest: Option<TelemetrySnapshot>,
}

/// Publish/subscribe channel that fans snapshots out to registered observers.
///
/// Observers run synchronously on the publishing task, in registration order,
/// without the registry locked: a callback may read `latest()`, subscribe, or
/// drop subscriptions, and those changes apply from the next publish. A
/// callback must not `publish` itself, since publishes are serialized.
#[derive(Clone)]
pub struct SnapshotBus {
    registry: Arc<Mutex<Registry>>,
    dispatch: Arc<Mutex<()>>,
}

impl SnapshotBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
                latest: None,
            })),
            dispatch: Arc::new(Mutex::new(())),
        }
    }

    /// Registers `observer`; it stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&TelemetrySnapshot) + Send + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .observers
            .push((id, Arc::new(Mutex::new(Box::new(observer)))));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Records `snapshot` as the latest state and delivers it to every observer.
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        let _dispatch = recover(self.dispatch.lock());
        let observers: Vec<Observer> = {
            let mut registry = self.lock();
            registry.latest = Some(snapshot.clone());
            registry
                .observers
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect()
        };

        for observer in observers {
            let mut observer = recover(observer.lock());
            let notify = &mut **observer;
            notify(&snapshot);
        }
    }

    pub fn latest(&self) -> Option<TelemetrySnapshot> {
        self.lock().latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.registry)
    }
}

impl Default for SnapshotBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one registered observer. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the observer immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock_registry(&registry)
                .observers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    recover(registry.lock())
}

// A panicking observer must not wedge the bus for everyone else.
fn recover<T>(result: LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}
