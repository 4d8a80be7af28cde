//! # Rows and Row Changes
//!
//! The backend speaks in untyped JSON rows. These helpers convert between
//! rows and the typed entities, and describe the row-level change events
//! pushed by the real-time feed.

use crate::errors::TypeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A database row: top-level column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Backend table names.
pub mod tables {
    /// Per-user compliance records.
    pub const COMPLIANCE_RECORDS: &str = "user_compliance_records";
    /// Requirement templates keyed by role and tier.
    pub const REQUIREMENT_TEMPLATES: &str = "compliance_requirement_templates";
    /// Per-user tier roll-ups.
    pub const TIER_SUMMARIES: &str = "compliance_tier_summaries";
}

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A change event delivered by the real-time feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    /// Change kind.
    pub kind: ChangeKind,
    /// Table the row belongs to.
    pub table: String,
    /// Row after the change (insert / update).
    #[serde(default)]
    pub new: Option<Row>,
    /// Row before the change (update / delete).
    #[serde(default)]
    pub old: Option<Row>,
}

impl RowChange {
    /// Build an insert event.
    pub fn insert(table: impl Into<String>, new: Row) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table: table.into(),
            new: Some(new),
            old: None,
        }
    }

    /// Build an update event.
    pub fn update(table: impl Into<String>, old: Option<Row>, new: Row) -> Self {
        Self {
            kind: ChangeKind::Update,
            table: table.into(),
            new: Some(new),
            old,
        }
    }

    /// Build a delete event.
    pub fn delete(table: impl Into<String>, old: Row) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table: table.into(),
            new: None,
            old: Some(old),
        }
    }

    /// The row that identifies the affected record (new, else old).
    pub fn subject(&self) -> Option<&Row> {
        self.new.as_ref().or(self.old.as_ref())
    }

    /// String value of the `id` column of the affected row.
    pub fn row_id(&self) -> Option<&str> {
        self.subject()
            .and_then(|row| row.get("id"))
            .and_then(|id| id.as_str())
    }
}

/// Encode a typed entity as a row.
pub fn encode_row<T: Serialize>(value: &T) -> Result<Row, TypeError> {
    match serde_json::to_value(value).map_err(|e| TypeError::Decode(e.to_string()))? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(TypeError::NotAnObject),
    }
}

/// Decode a single row into a typed entity.
pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, TypeError> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| TypeError::Decode(e.to_string()))
}

/// Decode a batch of rows, failing on the first malformed row.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, TypeError> {
    rows.into_iter().map(decode_row).collect()
}
