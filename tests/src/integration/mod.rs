//! Integration flows across the store, gateway, bus and notifications.

pub mod notify_flows;
pub mod support;
pub mod sync_flows;
