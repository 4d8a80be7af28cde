//! # Listener Registry
//!
//! Bounded set of synchronous state listeners. Each registration returns a
//! [`ListenerGuard`]; dropping the guard (or calling `unsubscribe`) removes
//! the listener. Listeners run in registration order.
//!
//! Every snapshot carries a version. A listener never receives a version
//! lower than or equal to one it has already been handed; when concurrent
//! mutations race to notify, the stale snapshot is skipped for that
//! listener.

use super::errors::StoreError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Maximum listeners when not configured otherwise.
pub const DEFAULT_MAX_LISTENERS: usize = 256;

/// Callback invoked with every new snapshot.
pub type Listener<S> = Arc<dyn Fn(&Arc<S>) + Send + Sync>;

/// Opaque registration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

struct Entry<S> {
    token: ListenerToken,
    listener: Listener<S>,
    seen: Arc<AtomicU64>,
}

struct Slots<S> {
    next_token: u64,
    entries: Vec<Entry<S>>,
}

/// Registry of listeners over snapshots of type `S`.
pub struct ListenerRegistry<S> {
    limit: usize,
    slots: Arc<Mutex<Slots<S>>>,
}

impl<S> ListenerRegistry<S> {
    /// Registry accepting at most `limit` listeners.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            slots: Arc::new(Mutex::new(Slots {
                next_token: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    pub fn register<F>(&self, listener: F) -> Result<ListenerGuard<S>, StoreError>
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        let mut slots = self.slots.lock();
        if slots.entries.len() >= self.limit {
            return Err(StoreError::ListenerLimit { limit: self.limit });
        }
        let token = ListenerToken(slots.next_token);
        slots.next_token += 1;
        slots.entries.push(Entry {
            token,
            listener: Arc::new(listener),
            seen: Arc::new(AtomicU64::new(0)),
        });
        Ok(ListenerGuard {
            token,
            slots: Arc::downgrade(&self.slots),
        })
    }

    /// Invoke every listener with `snapshot` at `version`, returning how
    /// many ran.
    ///
    /// Listeners that were already handed `version` or a newer one are
    /// skipped. The lock is released before any listener runs, so listeners
    /// may register or drop guards themselves.
    pub fn notify(&self, snapshot: &Arc<S>, version: u64) -> usize {
        let listeners: Vec<(Listener<S>, Arc<AtomicU64>)> = self
            .slots
            .lock()
            .entries
            .iter()
            .map(|e| (Arc::clone(&e.listener), Arc::clone(&e.seen)))
            .collect();
        let mut ran = 0;
        for (listener, seen) in &listeners {
            if seen.fetch_max(version, Ordering::SeqCst) >= version {
                continue;
            }
            listener(snapshot);
            ran += 1;
        }
        ran
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured maximum.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Remove every listener. Outstanding guards become no-ops.
    pub fn clear(&self) {
        self.slots.lock().entries.clear();
    }
}

/// Handle that removes its listener when dropped.
#[must_use = "dropping the guard unsubscribes the listener"]
pub struct ListenerGuard<S> {
    token: ListenerToken,
    slots: Weak<Mutex<Slots<S>>>,
}

impl<S> ListenerGuard<S> {
    /// Token of the registration.
    pub fn token(&self) -> ListenerToken {
        self.token
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the life of the registry.
    pub fn detach(mut self) {
        self.slots = Weak::new();
    }
}

impl<S> Drop for ListenerGuard<S> {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.lock().entries.retain(|e| e.token != self.token);
        }
    }
}

impl<S> std::fmt::Debug for ListenerGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("token", &self.token)
            .finish()
    }
}
