//! # Record Patches
//!
//! Partial updates to a compliance record. A patch is a set of top-level
//! column values, applied to the cached record optimistically and sent to
//! the gateway as the update payload.

use super::errors::StoreError;
use compliance_types::{decode_row, encode_row, ComplianceRecord, ComplianceStatus, Row};
use serde_json::Value;

/// Columns a patch may not touch.
const IMMUTABLE_COLUMNS: &[&str] = &["id", "user_id", "created_at"];

/// Partial update of a compliance record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch(Row);

impl RecordPatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status.
    pub fn status(self, status: ComplianceStatus) -> Self {
        self.set("status", Value::String(status.as_str().to_string()))
    }

    /// Set the notes.
    pub fn notes(self, notes: impl Into<String>) -> Self {
        self.set("notes", Value::String(notes.into()))
    }

    /// Set the current value.
    pub fn current_value(self, value: Value) -> Self {
        self.set("current_value", value)
    }

    /// Set an arbitrary column.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.0.insert(column.into(), value);
        self
    }

    /// Patch from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::InvalidPatch(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Whether the patch sets nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Columns set by the patch.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Consume into the remote update payload.
    pub fn into_row(self) -> Row {
        self.0
    }

    /// Record with the patch applied.
    ///
    /// Identity columns may only be "set" to their current value.
    pub fn apply_to(&self, record: &ComplianceRecord) -> Result<ComplianceRecord, StoreError> {
        let mut row = encode_row(record)?;
        for (column, value) in &self.0 {
            if IMMUTABLE_COLUMNS.contains(&column.as_str()) && row.get(column) != Some(value) {
                return Err(StoreError::InvalidPatch(format!(
                    "column {column} cannot be changed"
                )));
            }
            row.insert(column.clone(), value.clone());
        }
        decode_row(row).map_err(|e| StoreError::InvalidPatch(e.to_string()))
    }
}

impl From<Row> for RecordPatch {
    fn from(row: Row) -> Self {
        Self(row)
    }
}
