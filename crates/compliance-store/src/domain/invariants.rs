//! # Invariants
//!
//! Checks over a store snapshot. Used by tests and by debug assertions in
//! the application layer.

use super::state::IntegrationState;
use std::collections::HashSet;

/// The component-count metric equals the number of registered components.
pub fn invariant_component_count(state: &IntegrationState) -> bool {
    state.performance_metrics.component_count == state.component_states.len()
}

/// The sync-error log never exceeds its cap.
pub fn invariant_sync_error_cap(state: &IntegrationState, cap: usize) -> bool {
    state.sync_errors.len() <= cap
}

/// No two cached records share an id.
pub fn invariant_unique_records(state: &IntegrationState) -> bool {
    let mut seen = HashSet::new();
    state
        .user_compliance_records
        .iter()
        .all(|r| seen.insert(r.id.as_str()))
}

/// No two queued conflicts share an id.
pub fn invariant_unique_conflicts(state: &IntegrationState) -> bool {
    let mut seen = HashSet::new();
    state.conflict_queue.iter().all(|c| seen.insert(c.id))
}
