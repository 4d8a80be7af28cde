//! # Integration State
//!
//! The snapshot held by a store. Consumers only ever see it behind an
//! `Arc`; changes go through `ComplianceStore::set_state`.

use super::conflicts::ConflictItem;
use chrono::{DateTime, Utc};
use compliance_types::{
    ComplianceRecord, ComplianceStatus, ComplianceTier, RecordId, RequirementTemplate, SyncStatus,
    TierSummary, UserId, UserRole,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Caller-supplied component identifier.
pub type ComponentId = String;

/// Default capacity of the rolling sync-error log.
pub const MAX_SYNC_ERRORS: usize = 20;

/// Counters kept alongside the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Number of registered components.
    pub component_count: usize,
    /// Render samples recorded since creation.
    pub total_renders: u64,
    /// State-update samples recorded since creation.
    pub total_state_updates: u64,
    /// Time of the last recorded sample.
    pub last_update_at: Option<DateTime<Utc>>,
}

/// Descriptive entry for an open subscription or background task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Channel or task name.
    pub name: String,
    /// Table being followed, if any.
    pub table: Option<String>,
    /// When it was opened.
    pub opened_at: DateTime<Utc>,
}

/// The store snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationState {
    /// Cached compliance records for the current user.
    pub user_compliance_records: Vec<ComplianceRecord>,
    /// Requirement templates for the current role and tier.
    pub requirement_templates: Vec<RequirementTemplate>,
    /// Tier roll-ups for the current user.
    pub tier_summaries: Vec<TierSummary>,

    /// Sync state.
    pub sync_status: SyncStatus,
    /// Completion time of the last successful load.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Rolling log of sync failures, oldest first.
    pub sync_errors: Vec<String>,

    /// Ephemeral per-component state.
    pub component_states: BTreeMap<ComponentId, serde_json::Value>,
    /// Names currently bound in the shared-data registry.
    pub shared_data_keys: BTreeSet<String>,

    /// Unresolved conflicts in arrival order.
    pub conflict_queue: Vec<ConflictItem>,
    /// Diagnostics counters.
    pub performance_metrics: PerformanceMetrics,
    /// Open subscriptions and background tasks by name.
    pub active_subscriptions: BTreeMap<String, SubscriptionInfo>,

    /// A load started by `initialize` is in flight.
    pub is_loading: bool,
    /// Last error surfaced to the UI.
    pub error: Option<String>,

    /// Current user.
    pub user_id: Option<UserId>,
    /// Current user's role.
    pub user_role: Option<UserRole>,
    /// Current user's tier.
    pub user_tier: Option<ComplianceTier>,
}

impl IntegrationState {
    /// Cached record by id.
    pub fn record(&self, id: &RecordId) -> Option<&ComplianceRecord> {
        self.user_compliance_records.iter().find(|r| &r.id == id)
    }

    /// Replace the cached record with the same id, or append it.
    ///
    /// Returns `true` when an existing record was replaced.
    pub fn upsert_record(&mut self, record: ComplianceRecord) -> bool {
        match self
            .user_compliance_records
            .iter_mut()
            .find(|r| r.id == record.id)
        {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.user_compliance_records.push(record);
                false
            }
        }
    }

    /// Remove a cached record, returning it.
    pub fn remove_record(&mut self, id: &RecordId) -> Option<ComplianceRecord> {
        let index = self.user_compliance_records.iter().position(|r| &r.id == id)?;
        Some(self.user_compliance_records.remove(index))
    }

    /// Append to the sync-error log, evicting the oldest entries past `cap`.
    pub fn push_sync_error(&mut self, message: impl Into<String>, cap: usize) {
        self.sync_errors.push(message.into());
        if self.sync_errors.len() > cap {
            let excess = self.sync_errors.len() - cap;
            self.sync_errors.drain(..excess);
        }
    }

    /// Number of cached records in `status`.
    pub fn count_by_status(&self, status: ComplianceStatus) -> usize {
        self.user_compliance_records
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Share of cached records that are compliant, in percent.
    pub fn compliance_percentage(&self) -> f64 {
        let total = self.user_compliance_records.len();
        if total == 0 {
            return 0.0;
        }
        (self.count_by_status(ComplianceStatus::Compliant) as f64 / total as f64) * 100.0
    }
}
