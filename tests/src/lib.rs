//! # Compliance-Sync Test Suite
//!
//! Cross-crate flows that drive the store through the in-memory backend.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs        # Seeded backend and polling helpers
//!     ├── sync_flows.rs     # Load, change feed, conflicts, rollback
//!     └── notify_flows.rs   # Notification payloads through the gateway
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p store-tests
//! cargo test -p store-tests integration::sync_flows::
//! ```

#![allow(dead_code)]

pub mod integration;
