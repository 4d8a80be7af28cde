//! # Compliance Store
//!
//! The state container. Holds the snapshot copy-on-write behind a lock,
//! fans new snapshots out to listeners and the event bus, and owns the
//! background tasks started by real-time sync.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::StoreConfig;
use crate::domain::{
    FieldMergePolicy, IntegrationState, ListenerGuard, ListenerRegistry, PendingWrites,
    PerformanceTracker, SharedRegistry, StoreError,
};
use compliance_types::UserId;
use remote_gateway::RemoteGateway;
use store_bus::{InMemoryEventBus, StoreEvent};

/// Shared state behind every clone of a [`ComplianceStore`].
pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) gateway: Arc<dyn RemoteGateway>,
    pub(crate) merge_policy: FieldMergePolicy,
    pub(crate) bus: Arc<InMemoryEventBus>,
    state: Mutex<Arc<IntegrationState>>,
    version: AtomicU64,
    listeners: ListenerRegistry<IntegrationState>,
    pub(crate) pending: Mutex<PendingWrites>,
    pub(crate) shared: RwLock<SharedRegistry>,
    pub(crate) performance: Mutex<PerformanceTracker>,
    pub(crate) tasks: Mutex<Vec<BackgroundTask>>,
}

/// A snapshot swapped in by [`ComplianceStore::swap_state`] and not yet
/// announced.
#[must_use = "listeners are not notified until the update is published"]
pub(crate) struct StateUpdate {
    snapshot: Arc<IntegrationState>,
    version: u64,
}

/// A spawned task and the name it is listed under in `active_subscriptions`.
pub(crate) struct BackgroundTask {
    pub(crate) name: String,
    pub(crate) handle: JoinHandle<()>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.handle.abort();
        }
    }
}

/// Observable compliance state container with remote sync.
///
/// Cloning is cheap and every clone refers to the same store.
#[derive(Clone)]
pub struct ComplianceStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl ComplianceStore {
    /// Create a store over `gateway`.
    pub fn new(config: StoreConfig, gateway: Arc<dyn RemoteGateway>) -> Self {
        let merge_policy = FieldMergePolicy::new(config.server_owned_fields.iter().cloned());
        let inner = StoreInner {
            listeners: ListenerRegistry::new(config.max_listeners),
            bus: Arc::new(InMemoryEventBus::with_capacity(config.event_bus_capacity)),
            performance: Mutex::new(PerformanceTracker::new(config.performance_history)),
            state: Mutex::new(Arc::new(IntegrationState::default())),
            version: AtomicU64::new(0),
            pending: Mutex::new(PendingWrites::new()),
            shared: RwLock::new(SharedRegistry::new()),
            tasks: Mutex::new(Vec::new()),
            merge_policy,
            gateway,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Current snapshot.
    pub fn get_state(&self) -> Arc<IntegrationState> {
        Arc::clone(&self.inner.state.lock())
    }

    /// Apply `mutator` to a copy of the snapshot, swap it in and notify.
    ///
    /// Mutations are serialized. Listeners run after the lock is released,
    /// in registration order. Under concurrent mutation a listener may skip
    /// a snapshot, but never sees versions go backwards.
    pub fn set_state<F>(&self, mutator: F)
    where
        F: FnOnce(&mut IntegrationState),
    {
        self.update_state(mutator);
    }

    /// Like [`set_state`](Self::set_state), returning the mutator's result.
    pub(crate) fn update_state<R, F>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut IntegrationState) -> R,
    {
        let (update, result) = self.swap_state(mutator);
        self.publish(update);
        result
    }

    /// Swap in a mutated snapshot without notifying yet.
    ///
    /// The caller must hand the returned update to [`publish`](Self::publish)
    /// once it has released any locks of its own.
    pub(crate) fn swap_state<R, F>(&self, mutator: F) -> (StateUpdate, R)
    where
        F: FnOnce(&mut IntegrationState) -> R,
    {
        let mut current = self.inner.state.lock();
        let mut next = IntegrationState::clone(&current);
        let result = mutator(&mut next);
        let snapshot = Arc::new(next);
        *current = Arc::clone(&snapshot);
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        (StateUpdate { snapshot, version }, result)
    }

    /// Notify listeners and the bus of a swapped-in snapshot.
    pub(crate) fn publish(&self, update: StateUpdate) {
        let StateUpdate { snapshot, version } = update;
        let notified = self.inner.listeners.notify(&snapshot, version);
        debug!(version, listeners = notified, "State updated");
        self.inner.bus.emit(StoreEvent::StateChanged { version });
    }

    /// Mutate the snapshot without notifying anyone.
    ///
    /// Reserved for diagnostics counters, which would otherwise cause a
    /// notification per render.
    pub(crate) fn update_state_quietly<F>(&self, mutator: F)
    where
        F: FnOnce(&mut IntegrationState),
    {
        let mut current = self.inner.state.lock();
        let mut next = IntegrationState::clone(&current);
        mutator(&mut next);
        *current = Arc::new(next);
    }

    /// Replace the snapshot wholesale without notifying anyone.
    pub(crate) fn reset_state(&self) {
        *self.inner.state.lock() = Arc::new(IntegrationState::default());
    }

    /// Register a listener called with every new snapshot.
    pub fn subscribe<F>(&self, listener: F) -> Result<ListenerGuard<IntegrationState>, StoreError>
    where
        F: Fn(&Arc<IntegrationState>) + Send + Sync + 'static,
    {
        let guard = self.inner.listeners.register(listener)?;
        debug!(token = ?guard.token(), listeners = self.inner.listeners.len(), "Listener registered");
        Ok(guard)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Event bus carrying [`StoreEvent`]s.
    pub fn event_bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.inner.bus)
    }

    /// Number of snapshot mutations so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Current user, or `NotInitialized`.
    pub fn current_user(&self) -> Result<UserId, StoreError> {
        self.get_state()
            .user_id
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    pub(crate) fn drop_listeners(&self) {
        self.inner.listeners.clear();
    }
}

impl std::fmt::Debug for ComplianceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceStore")
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
