//! Demo data loaded into the in-memory gateway.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use compliance_types::{
    encode_row, tables, ComplianceRecord, ComplianceStatus, ComplianceTier, Row, UserId, UserRole,
};
use notifications::SEND_NOTIFICATION_FUNCTION;
use remote_gateway::InMemoryGateway;

const METRICS: &[(&str, ComplianceStatus)] = &[
    ("cpr-certification", ComplianceStatus::Compliant),
    ("background-check", ComplianceStatus::Pending),
    ("teaching-hours", ComplianceStatus::Warning),
    ("annual-audit", ComplianceStatus::NonCompliant),
];

fn object(value: Value) -> Result<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("fixture is not an object: {other}"),
    }
}

/// Seed records, templates and a tier summary for `user`, and register a
/// delivery function that logs instead of sending.
pub fn seed(
    gateway: &InMemoryGateway,
    user: &UserId,
    role: UserRole,
    tier: ComplianceTier,
) -> Result<()> {
    let records = METRICS
        .iter()
        .enumerate()
        .map(|(i, (metric, status))| {
            let record =
                ComplianceRecord::new(format!("{user}-rec-{i}"), user.clone(), *metric, *status);
            let record = match status {
                ComplianceStatus::Compliant => record,
                _ => record.with_notes(format!("{metric} awaiting review")),
            };
            encode_row(&record).context("Failed to encode demo record")
        })
        .collect::<Result<Vec<_>>>()?;

    let templates = METRICS
        .iter()
        .enumerate()
        .map(|(i, (metric, _))| {
            object(json!({
                "id": format!("tpl-{metric}"),
                "role": role.as_str(),
                "tier": tier.as_str(),
                "name": metric.replace('-', " "),
                "category": "training",
                "is_mandatory": i < 2,
                "display_order": i,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    let completed = METRICS
        .iter()
        .filter(|(_, s)| *s == ComplianceStatus::Compliant)
        .count();
    let summary = object(json!({
        "user_id": user.as_str(),
        "tier": tier.as_str(),
        "total_requirements": METRICS.len(),
        "completed_requirements": completed,
        "completion_percentage": completed as f64 * 100.0 / METRICS.len() as f64,
        "updated_at": Utc::now(),
    }))?;

    gateway.seed(tables::COMPLIANCE_RECORDS, records);
    gateway.seed(tables::REQUIREMENT_TEMPLATES, templates);
    gateway.seed(tables::TIER_SUMMARIES, vec![summary]);

    gateway.register_function(SEND_NOTIFICATION_FUNCTION, |body| {
        info!(
            to = body["to"].as_str().unwrap_or_default(),
            subject = body["subject"].as_str().unwrap_or_default(),
            "Email accepted for delivery"
        );
        Ok(json!({ "queued": true }))
    });

    info!(user = %user, records = METRICS.len(), "Demo data seeded");
    Ok(())
}
