use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::LiveEvent;

/// Identifies one registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

/// Local observer of live events
///
/// Called synchronously from the channel's delivery context, in registration
/// order; implementations must not block and must not assume a particular
/// thread.
pub trait LiveEventObserver: Send + Sync + 'static {
    /// Handles one live event
    fn on_live_event(&self, event: &LiveEvent);
}

/// Ordered multicast registry of observers
///
/// Fan-out snapshots the registration list, so observers added after a
/// delivery begins do not see that delivery. Once closed, nothing is
/// delivered again.
pub(crate) struct ObserverRegistry {
    observers: RwLock<Vec<(ObserverId, Arc<dyn LiveEventObserver>)>>,
    closed: AtomicBool,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn add(&self, observer: Arc<dyn LiveEventObserver>) -> ObserverId {
        let id = ObserverId(Uuid::new_v4());
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event: &LiveEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let snapshot: Vec<Arc<dyn LiveEventObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in snapshot {
            observer.on_live_event(event);
        }
    }
}
