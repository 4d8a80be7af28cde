//! # Store Configuration
//!
//! Limits and timings for a `ComplianceStore` instance.

use crate::domain::{DEFAULT_MAX_LISTENERS, MAX_SYNC_ERRORS, PERFORMANCE_HISTORY};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Compliance store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Capacity of the rolling sync-error log.
    pub max_sync_errors: usize,

    /// Samples kept per key by the performance tracker.
    pub performance_history: usize,

    /// Maximum number of state listeners.
    pub max_listeners: usize,

    /// Periodic reconcile interval in seconds. Zero disables it.
    pub auto_sync_interval_secs: u64,

    /// Prefix of the real-time channel name; the user id is appended.
    pub realtime_channel_prefix: String,

    /// Buffer size of the store event bus.
    pub event_bus_capacity: usize,

    /// Fields whose remote value always wins during a merge.
    pub server_owned_fields: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sync_errors: MAX_SYNC_ERRORS,
            performance_history: PERFORMANCE_HISTORY,
            max_listeners: DEFAULT_MAX_LISTENERS,
            auto_sync_interval_secs: 300,
            realtime_channel_prefix: "compliance-records".to_string(),
            event_bus_capacity: store_bus::DEFAULT_CHANNEL_CAPACITY,
            server_owned_fields: ["id", "user_id", "created_at", "updated_at"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl StoreConfig {
    /// Create a config for testing (no background reconcile, small bus).
    pub fn for_testing() -> Self {
        Self {
            max_listeners: 16,
            auto_sync_interval_secs: 0,
            event_bus_capacity: 64,
            ..Self::default()
        }
    }

    /// Read overrides from the environment on top of the defaults.
    ///
    /// - `CS_MAX_SYNC_ERRORS`
    /// - `CS_PERFORMANCE_HISTORY`
    /// - `CS_MAX_LISTENERS`
    /// - `CS_AUTO_SYNC_SECS` (0 disables)
    /// - `CS_REALTIME_CHANNEL`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_sync_errors: env_parse("CS_MAX_SYNC_ERRORS").unwrap_or(defaults.max_sync_errors),
            performance_history: env_parse("CS_PERFORMANCE_HISTORY")
                .unwrap_or(defaults.performance_history),
            max_listeners: env_parse("CS_MAX_LISTENERS").unwrap_or(defaults.max_listeners),
            auto_sync_interval_secs: env_parse("CS_AUTO_SYNC_SECS")
                .unwrap_or(defaults.auto_sync_interval_secs),
            realtime_channel_prefix: env::var("CS_REALTIME_CHANNEL")
                .unwrap_or(defaults.realtime_channel_prefix),
            ..defaults
        }
    }

    /// Periodic reconcile interval, if enabled.
    pub fn auto_sync_interval(&self) -> Option<Duration> {
        (self.auto_sync_interval_secs > 0).then(|| Duration::from_secs(self.auto_sync_interval_secs))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
