//! Emitter - explicit subscription registry for notifications
//!
//! Every `subscribe()` registers a listener and returns a [`Subscription`]
//! handle. Dropping the handle (or calling `unsubscribe`) removes the
//! listener. Values are delivered in emit order to every live listener.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

struct Registry<T> {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<T>>,
}

/// Fan-out point for one notification type.
pub struct Emitter<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self { registry: self.registry.clone() }
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry { next_id: 0, listeners: HashMap::new() })),
        }
    }
}

impl<T: Clone + Send + 'static> Emitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, tx);
        Subscription { id, rx, registry: Arc::downgrade(&self.registry) }
    }

    /// Deliver `value` to every listener. Listeners whose receiver is gone
    /// are pruned.
    pub fn emit(&self, value: T) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.listeners.retain(|_, tx| tx.send(value.clone()).is_ok());
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).listeners.len()
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

/// Handle to one registered listener.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the emitter is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take a value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Remove this listener from the registry.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.listeners.remove(&self.id);
        }
    }
}
