//! # Store Bus - Change Notifications for the Compliance Store
//!
//! Async consumers follow store changes through this bus instead of
//! registering closures on the state container.
//!
//! ```text
//! ┌──────────────────┐   emit()    ┌──────────────┐  subscribe()  ┌────────────┐
//! │ ComplianceStore  │ ──────────▶ │  Event Bus   │ ────────────▶ │ Dashboards │
//! └──────────────────┘             └──────────────┘               └────────────┘
//! ```
//!
//! Slow subscribers lag and skip events; publishers never block.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, StoreEvent};
pub use publisher::InMemoryEventBus;
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(InMemoryEventBus::new().capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
