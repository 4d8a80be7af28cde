//! # Application Module
//!
//! The `ComplianceStore` service: state container, sync engine, conflict
//! queue, registries and diagnostics over the remote gateway port.

mod conflicts;
mod realtime;
mod registry;
mod store;
mod sync;

pub use realtime::{ChangeOutcome, AUTO_SYNC_TASK};
pub use store::ComplianceStore;
