//! Prometheus metrics for the compliance store.
//!
//! All metrics follow the naming convention: `cs_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

use crate::TelemetryError;

lazy_static! {
    /// Registry holding every store metric
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SYNC ENGINE
    // =========================================================================

    /// Full loads by outcome (success / error / offline)
    pub static ref SYNC_RUNS: CounterVec = CounterVec::new(
        Opts::new("cs_sync_runs_total", "Compliance data loads by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Duration of a full load
    pub static ref SYNC_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cs_sync_duration_seconds",
            "Time spent loading a user's compliance data"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("bucket layout"))
    ).expect("metric creation failed");

    /// Remote writes by outcome (success / error)
    pub static ref REMOTE_WRITES: CounterVec = CounterVec::new(
        Opts::new("cs_remote_writes_total", "Optimistic record writes by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Real-time change events applied, by kind
    pub static ref REALTIME_EVENTS: CounterVec = CounterVec::new(
        Opts::new("cs_realtime_events_total", "Row-change events received"),
        &["kind"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONFLICT QUEUE
    // =========================================================================

    /// Conflicts queued, by type
    pub static ref CONFLICTS_QUEUED: CounterVec = CounterVec::new(
        Opts::new("cs_conflicts_queued_total", "Conflicts added to the queue"),
        &["type"]
    ).expect("metric creation failed");

    /// Conflicts resolved, by resolution
    pub static ref CONFLICTS_RESOLVED: CounterVec = CounterVec::new(
        Opts::new("cs_conflicts_resolved_total", "Conflicts resolved"),
        &["resolution"]
    ).expect("metric creation failed");

    // =========================================================================
    // REGISTRIES
    // =========================================================================

    /// Registered components across all stores
    pub static ref COMPONENTS_REGISTERED: Gauge = Gauge::new(
        "cs_components_registered",
        "Components currently registered with a store"
    ).expect("metric creation failed");
}

static REGISTERED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// Register all metrics with the global registry.
///
/// Safe to call repeatedly; every call reports the outcome of the first.
pub fn register_metrics() -> Result<(), TelemetryError> {
    REGISTERED.get_or_init(|| register_into(&REGISTRY)).clone()
}

fn register_into(registry: &Registry) -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SYNC_RUNS.clone()),
        Box::new(SYNC_DURATION.clone()),
        Box::new(REMOTE_WRITES.clone()),
        Box::new(REALTIME_EVENTS.clone()),
        Box::new(CONFLICTS_QUEUED.clone()),
        Box::new(CONFLICTS_RESOLVED.clone()),
        Box::new(COMPONENTS_REGISTERED.clone()),
    ];

    for metric in metrics {
        registry
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record the outcome of a full load.
pub fn record_sync(outcome: &str, elapsed: Duration) {
    SYNC_RUNS.with_label_values(&[outcome]).inc();
    SYNC_DURATION.observe(elapsed.as_secs_f64());
}

/// Record the outcome of an optimistic write.
pub fn record_remote_write(success: bool) {
    let outcome = if success { "success" } else { "error" };
    REMOTE_WRITES.with_label_values(&[outcome]).inc();
}

/// Record a row-change event.
pub fn record_realtime_event(kind: &str) {
    REALTIME_EVENTS.with_label_values(&[kind]).inc();
}

/// Record a queued conflict.
pub fn record_conflict_queued(conflict_type: &str) {
    CONFLICTS_QUEUED.with_label_values(&[conflict_type]).inc();
}

/// Record a resolved conflict.
pub fn record_conflict_resolved(resolution: &str) {
    CONFLICTS_RESOLVED.with_label_values(&[resolution]).inc();
}

/// Adjust the registered-component gauge.
pub fn record_component_delta(delta: f64) {
    COMPONENTS_REGISTERED.add(delta);
}
