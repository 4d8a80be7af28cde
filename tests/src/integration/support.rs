//! # Test Fixtures
//!
//! A backend seeded for user `u1` (role AP, tier basic) plus one row that
//! belongs to somebody else, and helpers for waiting on background tasks.

use std::sync::Arc;
use std::time::Duration;

use compliance_store::{ComplianceStore, IntegrationState, StoreConfig};
use compliance_types::{encode_row, tables, ComplianceRecord, ComplianceStatus, Row};
use remote_gateway::InMemoryGateway;
use serde_json::{json, Value};

/// User every fixture row belongs to.
pub const USER: &str = "u1";

/// How long [`eventually`] waits before giving up.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Convert a JSON object into a row.
pub fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture is not an object: {other}"),
    }
}

/// Encoded compliance record for `user`.
pub fn record_row(id: &str, user: &str, status: ComplianceStatus) -> Row {
    encode_row(&ComplianceRecord::new(id, user, "cpr", status)).unwrap()
}

/// Backend with three records, two templates and a summary for [`USER`].
pub fn seeded_gateway() -> Arc<InMemoryGateway> {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed(
        tables::COMPLIANCE_RECORDS,
        vec![
            record_row("r1", USER, ComplianceStatus::Compliant),
            record_row("r2", USER, ComplianceStatus::Pending),
            record_row("r3", USER, ComplianceStatus::NonCompliant),
            record_row("x1", "u2", ComplianceStatus::Pending),
        ],
    );
    gateway.seed(
        tables::REQUIREMENT_TEMPLATES,
        vec![
            object(json!({"id": "t2", "role": "AP", "tier": "basic", "name": "Audit", "display_order": 2})),
            object(json!({"id": "t1", "role": "AP", "tier": "basic", "name": "CPR", "display_order": 1})),
        ],
    );
    gateway.seed(
        tables::TIER_SUMMARIES,
        vec![object(json!({
            "user_id": USER,
            "tier": "basic",
            "total_requirements": 3,
            "completed_requirements": 1,
            "completion_percentage": 33.3,
            "updated_at": "2024-01-01T00:00:00Z"
        }))],
    );
    gateway
}

/// Store wired to `gateway` with test configuration.
pub fn store_over(gateway: &Arc<InMemoryGateway>) -> ComplianceStore {
    ComplianceStore::new(StoreConfig::for_testing(), gateway.clone())
}

/// Poll the snapshot until `check` holds. Panics after [`SETTLE_TIMEOUT`].
pub async fn eventually<F>(store: &ComplianceStore, what: &str, check: F) -> Arc<IntegrationState>
where
    F: Fn(&IntegrationState) -> bool,
{
    let wait = async {
        loop {
            let state = store.get_state();
            if check(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(SETTLE_TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
