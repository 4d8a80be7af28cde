//! # Compliance Store
//!
//! Observable, in-process state container for a user's compliance data.
//!
//! **Architecture:** Hexagonal (domain / application / outbound gateway port)
//!
//! ## Purpose
//!
//! Dashboards and widgets read one shared snapshot of the current user's
//! compliance records, requirement templates and tier summaries. The store
//! keeps that snapshot in step with the hosted backend:
//! - Full loads on initialization, on demand and on a fixed interval
//! - Optimistic record updates with per-record reconciliation on failure
//! - Real-time row changes with `updated_at` collision detection
//! - A conflict queue settled by local, remote, merge or manual resolution
//!
//! ## Observation
//!
//! | Channel | Delivery | Use |
//! |---------|----------|-----|
//! | `subscribe` | Synchronous, registration order | UI bindings |
//! | `event_bus` | Async broadcast, filterable | Background consumers |
//!
//! ## Module Structure
//!
//! ```text
//! compliance-store/
//! ├── domain/          # Snapshot, conflicts, merge policy, listeners, tracker
//! ├── application/     # ComplianceStore
//! └── config.rs        # StoreConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod application;
pub mod config;
pub mod domain;

// Re-exports
pub use application::{ChangeOutcome, ComplianceStore, AUTO_SYNC_TASK};
pub use config::StoreConfig;
pub use domain::{
    ComponentId, ComponentPerformanceStats, ConflictItem, FieldMergePolicy, IntegrationState,
    ListenerGuard, ListenerToken, NewConflict, PerformanceMetrics, PerformanceReport,
    RecordPatch, SharedKey, StoreError, SubscriptionInfo, DEFAULT_MAX_LISTENERS,
    MAX_SYNC_ERRORS, PERFORMANCE_HISTORY,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
