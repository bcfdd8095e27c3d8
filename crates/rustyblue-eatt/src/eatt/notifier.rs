//! Bearer lifecycle notifications
//!
//! Observers are called in registration order, outside any pool lock, after
//! the pool mutation they describe has completed.

use super::bearer::BearerInfo;
use super::types::{BearerId, ConnHandle};
use log::trace;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Lifecycle event reported to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerEvent {
    /// Bearer reached `connected`
    Connected(BearerInfo),
    /// Connected bearer went away
    Disconnected(BearerInfo),
    /// A bearer never reached `connected`
    OpenFailed {
        conn: ConnHandle,
        /// Channel id, when the transport had assigned one
        bearer: Option<BearerId>,
        reason: String,
    },
}

/// Callback for lifecycle events
pub type LifecycleCallback = Arc<Mutex<dyn FnMut(&BearerEvent) + Send + 'static>>;

/// Registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct LifecycleNotifier {
    observers: RwLock<Vec<(ObserverId, LifecycleCallback)>>,
    next_id: Mutex<u64>,
}

impl LifecycleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F) -> ObserverId
    where
        F: FnMut(&BearerEvent) + Send + 'static,
    {
        let id = {
            let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next_id += 1;
            ObserverId(*next_id)
        };

        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        observers.push((id, Arc::new(Mutex::new(callback))));
        id
    }

    /// Returns false if `id` was not registered
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(observer, _)| *observer != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn notify(&self, event: &BearerEvent) {
        // Snapshot so observers may register or unregister from a callback
        let observers: Vec<LifecycleCallback> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        trace!("Notifying {} observers of {:?}", observers.len(), event);
        for callback in observers {
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)(event);
        }
    }
}

impl std::fmt::Debug for LifecycleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}
