//! # Registries, Diagnostics and Error Log
//!
//! Per-component ephemeral state, the typed shared-data registry, render
//! and update timings, and the error fields of the snapshot.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::ComplianceStore;
use crate::domain::{
    invariant_component_count, PerformanceReport, SampleKind, SharedKey, StoreError,
};
use store_bus::StoreEvent;
use store_telemetry::metrics;

impl ComplianceStore {
    // =========================================================================
    // COMPONENT REGISTRY
    // =========================================================================

    /// Register a component with its initial state. Registering an id twice
    /// overwrites its state.
    pub fn register_component(&self, component_id: impl Into<String>, initial_state: Value) {
        let component_id = component_id.into();
        let added = self.update_state(|s| {
            let added = s
                .component_states
                .insert(component_id.clone(), initial_state)
                .is_none();
            s.performance_metrics.component_count = s.component_states.len();
            debug_assert!(invariant_component_count(s));
            added
        });
        if added {
            metrics::record_component_delta(1.0);
        }
        debug!(component = %component_id, added, "Component registered");
    }

    /// Merge `patch` into a component's state.
    ///
    /// Object patches are merged key by key into object state; anything
    /// else replaces the state. Unknown ids are registered.
    pub fn update_component_state(&self, component_id: &str, patch: Value) {
        let added = self.update_state(|s| {
            let added = !s.component_states.contains_key(component_id);
            let slot = s
                .component_states
                .entry(component_id.to_string())
                .or_insert(Value::Null);
            match (slot, patch) {
                (Value::Object(current), Value::Object(patch)) => current.extend(patch),
                (slot, patch) => *slot = patch,
            }
            s.performance_metrics.component_count = s.component_states.len();
            added
        });
        if added {
            metrics::record_component_delta(1.0);
        }
    }

    /// A component's current state.
    pub fn get_component_state(&self, component_id: &str) -> Option<Value> {
        self.get_state().component_states.get(component_id).cloned()
    }

    /// Remove a component, returning its last state.
    pub fn unregister_component(&self, component_id: &str) -> Option<Value> {
        if !self.get_state().component_states.contains_key(component_id) {
            return None;
        }
        let removed = self.update_state(|s| {
            let removed = s.component_states.remove(component_id);
            s.performance_metrics.component_count = s.component_states.len();
            debug_assert!(invariant_component_count(s));
            removed
        });
        if removed.is_some() {
            metrics::record_component_delta(-1.0);
            self.inner.performance.lock().forget(component_id);
            debug!(component = component_id, "Component unregistered");
        }
        removed
    }

    // =========================================================================
    // SHARED DATA
    // =========================================================================

    /// Bind `value` under `key`.
    pub fn set_shared_data<T>(&self, key: &SharedKey<T>, value: T) -> Result<(), StoreError>
    where
        T: Send + Sync + 'static,
    {
        self.inner.shared.write().set(key, value)?;
        if !self.get_state().shared_data_keys.contains(key.name()) {
            self.set_state(|s| {
                s.shared_data_keys.insert(key.name().to_string());
            });
        }
        Ok(())
    }

    /// Value bound under `key`.
    pub fn get_shared_data<T>(&self, key: &SharedKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner.shared.read().get(key)
    }

    /// Unbind `key`, returning its value.
    pub fn remove_shared_data<T>(&self, key: &SharedKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let removed = self.inner.shared.write().remove(key)?;
        self.set_state(|s| {
            s.shared_data_keys.remove(key.name());
        });
        Some(removed)
    }

    // =========================================================================
    // PERFORMANCE
    // =========================================================================

    /// Record how long a component took to render.
    pub fn track_component_render(&self, component_id: &str, duration_ms: f64) {
        self.inner
            .performance
            .lock()
            .record(SampleKind::Render, component_id, duration_ms);
        self.update_state_quietly(|s| {
            s.performance_metrics.total_renders += 1;
            s.performance_metrics.last_update_at = Some(Utc::now());
        });
    }

    /// Record how long a state update took.
    pub fn track_state_update(&self, update_key: &str, duration_ms: f64) {
        self.inner
            .performance
            .lock()
            .record(SampleKind::StateUpdate, update_key, duration_ms);
        self.update_state_quietly(|s| {
            s.performance_metrics.total_state_updates += 1;
            s.performance_metrics.last_update_at = Some(Utc::now());
        });
    }

    /// Timing statistics and snapshot size.
    pub fn get_performance_report(&self) -> PerformanceReport {
        let state = self.get_state();
        let (component_stats, state_update_stats) = {
            let tracker = self.inner.performance.lock();
            (
                tracker.all_stats(SampleKind::Render),
                tracker.all_stats(SampleKind::StateUpdate),
            )
        };
        let estimated_state_bytes = serde_json::to_vec(state.as_ref())
            .map(|bytes| bytes.len())
            .unwrap_or_default();

        PerformanceReport {
            component_stats,
            state_update_stats,
            component_count: state.performance_metrics.component_count,
            total_renders: state.performance_metrics.total_renders,
            total_state_updates: state.performance_metrics.total_state_updates,
            estimated_state_bytes,
            generated_at: Utc::now(),
        }
    }

    // =========================================================================
    // ERROR LOG
    // =========================================================================

    /// Surface an error message.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "Store error set");
        self.set_state(|s| s.error = Some(message.clone()));
        self.inner.bus.emit(StoreEvent::ErrorRaised { message });
    }

    /// Clear the surfaced error.
    pub fn clear_error(&self) {
        self.set_state(|s| s.error = None);
    }

    /// Append to the capped sync-error log.
    pub fn add_sync_error(&self, message: impl Into<String>) {
        let message = message.into();
        let cap = self.inner.config.max_sync_errors;
        debug!(error = %message, "Sync error recorded");
        self.set_state(|s| s.push_sync_error(message, cap));
    }

    /// Empty the sync-error log.
    pub fn clear_sync_errors(&self) {
        self.set_state(|s| s.sync_errors.clear());
    }
}
