//! # Compliance Store Runtime
//!
//! Demo entry point wiring the compliance store to an in-memory backend.
//!
//! ## Startup Sequence
//!
//! 1. Install tracing and register Prometheus metrics
//! 2. Load `StoreConfig` from the environment
//! 3. Seed the in-memory gateway with demo data
//! 4. Initialize the store (load + real-time sync)
//! 5. Exercise an update, diagnostics and a notification
//! 6. Run until Ctrl+C, then clean up
//!
//! ## Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CS_DEMO_USER` | `demo-user` |
//! | `CS_DEMO_ROLE` | `AP` |
//! | `CS_DEMO_TIER` | `basic` |

mod fixtures;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use compliance_store::{ComplianceStore, RecordPatch, StoreConfig};
use compliance_types::{ComplianceStatus, ComplianceTier, UserId, UserRole};
use notifications::{Branding, Notification, NotificationDispatcher, Welcome};
use remote_gateway::{InMemoryGateway, RemoteGateway};
use store_bus::{EventFilter, EventTopic};
use store_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

/// The demo runtime.
pub struct StoreRuntime {
    store: ComplianceStore,
    notifier: NotificationDispatcher<dyn RemoteGateway>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl StoreRuntime {
    /// Create a runtime over `gateway`.
    pub fn new(config: StoreConfig, gateway: Arc<dyn RemoteGateway>) -> Self {
        info!("Creating compliance store runtime");
        let store = ComplianceStore::new(config, Arc::clone(&gateway));
        let notifier = NotificationDispatcher::new(gateway, Branding::default());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        Self {
            store,
            notifier,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Initialize the store for `user` and start the event logger.
    pub async fn start(&self, user: UserId, role: UserRole, tier: ComplianceTier) -> Result<()> {
        info!("===========================================");
        info!("  Compliance Store Runtime v{}", compliance_store::VERSION);
        info!("===========================================");

        self.spawn_event_logger();
        self.store
            .initialize(user.clone(), role, tier)
            .await
            .context("Failed to initialize compliance store")?;

        let state = self.store.get_state();
        info!(
            user = %user,
            records = state.user_compliance_records.len(),
            templates = state.requirement_templates.len(),
            compliance_pct = %format!("{:.1}", state.compliance_percentage()),
            "Store ready"
        );
        Ok(())
    }

    /// Walk through an update, diagnostics and a notification.
    pub async fn run_demo(&self, email: &str) -> Result<()> {
        let state = self.store.get_state();
        let pending = state
            .user_compliance_records
            .iter()
            .find(|r| r.status == ComplianceStatus::Pending)
            .map(|r| r.id.clone());
        drop(state);

        if let Some(record_id) = pending {
            let patch = RecordPatch::new()
                .status(ComplianceStatus::Compliant)
                .notes("Verified by demo runtime");
            match self.store.update_compliance_record(&record_id, patch).await {
                Ok(record) => info!(record = %record.id, status = record.status.as_str(), "Record updated"),
                Err(e) => warn!(record = %record_id, error = %e, "Record update failed"),
            }
        }

        for (component, ms) in [("dashboard", 12.5), ("records-table", 8.0), ("dashboard", 9.75)] {
            self.store.track_component_render(component, ms);
        }
        self.store.track_state_update("records", 1.2);

        let report = self.store.get_performance_report();
        for stats in &report.component_stats {
            info!(
                component = %stats.key,
                samples = stats.sample_count,
                avg_ms = stats.avg_ms,
                max_ms = stats.max_ms,
                "Render timings"
            );
        }
        info!(bytes = report.estimated_state_bytes, "Estimated snapshot size");

        let welcome = Notification::Welcome(Welcome {
            recipient_name: self.store.current_user()?.to_string(),
            login_url: "https://portal.example.com/login".to_string(),
        });
        self.notifier
            .send(email, &welcome)
            .await
            .context("Failed to send welcome notification")?;

        let metrics = encode_metrics().context("Failed to encode metrics")?;
        info!(lines = metrics.lines().count(), "Prometheus metrics encoded");
        Ok(())
    }

    fn spawn_event_logger(&self) {
        let mut events = self.store.event_bus().event_stream(EventFilter::topics(vec![
            EventTopic::Sync,
            EventTopic::Realtime,
            EventTopic::Conflicts,
            EventTopic::Errors,
        ]));
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => info!(topic = ?event.topic(), ?event, "Store event"),
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        info!("[events] Shutdown signal received");
                        break;
                    }
                }
            }
        });
    }

    /// Stop background work and reset the store.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        self.store.cleanup();
        info!("Shutdown complete");
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _telemetry_guard = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = StoreConfig::from_env();
    let user = UserId::from(env_or("CS_DEMO_USER", "demo-user"));
    let role: UserRole = env_or("CS_DEMO_ROLE", "AP")
        .parse()
        .context("CS_DEMO_ROLE is not a known role")?;
    let tier: ComplianceTier = env_or("CS_DEMO_TIER", "basic")
        .parse()
        .context("CS_DEMO_TIER is not a known tier")?;

    let gateway = Arc::new(InMemoryGateway::new());
    fixtures::seed(&gateway, &user, role, tier)?;

    let runtime = StoreRuntime::new(config, gateway);
    runtime.start(user.clone(), role, tier).await?;
    runtime
        .run_demo(&format!("{user}@example.com"))
        .await?;

    info!("Store is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
