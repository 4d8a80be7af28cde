//! # Domain Module
//!
//! Snapshot, conflict, merge, listener and diagnostics types for the
//! compliance store. Nothing here performs I/O.

pub mod conflicts;
pub mod errors;
pub mod invariants;
pub mod listeners;
pub mod merge;
pub mod patch;
pub mod pending;
pub mod performance;
pub mod shared;
pub mod state;

pub use conflicts::*;
pub use errors::*;
pub use invariants::*;
pub use listeners::*;
pub use merge::*;
pub use patch::*;
pub use pending::*;
pub use performance::*;
pub use shared::*;
pub use state::*;
