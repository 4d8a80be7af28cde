//! # Conflict Queue Items
//!
//! Conflicts are first-class queued items, not errors. The store appends
//! them as they are detected and removes them when resolved or cleared.

use super::errors::StoreError;
use super::merge::FieldMergePolicy;
use chrono::{DateTime, Utc};
use compliance_types::{ConflictId, ConflictType, RecordId, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A queued conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictItem {
    /// Generated identifier.
    pub id: ConflictId,
    /// When the conflict was queued.
    pub timestamp: DateTime<Utc>,
    /// Kind of conflict.
    pub conflict_type: ConflictType,
    /// Compliance record concerned, if any.
    pub record_id: Option<RecordId>,
    /// Client-side payload.
    pub local_data: Value,
    /// Server-side payload.
    pub remote_data: Value,
    /// Resolution, once chosen.
    pub resolution: Option<Resolution>,
}

/// Conflict data supplied by the caller of `add_conflict`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConflict {
    /// Kind of conflict.
    pub conflict_type: ConflictType,
    /// Compliance record concerned, if any.
    pub record_id: Option<RecordId>,
    /// Client-side payload.
    pub local_data: Value,
    /// Server-side payload.
    pub remote_data: Value,
}

impl NewConflict {
    /// An incoming change disagreed with the cached version of a record.
    pub fn version(record_id: RecordId, local_data: Value, remote_data: Value) -> Self {
        Self {
            conflict_type: ConflictType::VersionConflict,
            record_id: Some(record_id),
            local_data,
            remote_data,
        }
    }

    /// A local write to a record was rejected.
    pub fn data(record_id: RecordId, local_data: Value, remote_data: Value) -> Self {
        Self {
            conflict_type: ConflictType::DataConflict,
            record_id: Some(record_id),
            local_data,
            remote_data,
        }
    }

    /// Component or shared state disagreed.
    pub fn state(local_data: Value, remote_data: Value) -> Self {
        Self {
            conflict_type: ConflictType::StateConflict,
            record_id: None,
            local_data,
            remote_data,
        }
    }

    /// Stamp the conflict with a fresh id and the current time.
    pub fn into_item(self) -> ConflictItem {
        ConflictItem {
            id: ConflictId::generate(),
            timestamp: Utc::now(),
            conflict_type: self.conflict_type,
            record_id: self.record_id,
            local_data: self.local_data,
            remote_data: self.remote_data,
            resolution: None,
        }
    }
}

/// Compute the payload a resolution settles on.
pub fn resolve_payload(
    item: &ConflictItem,
    resolution: Resolution,
    merged_data: Option<Value>,
    policy: &FieldMergePolicy,
) -> Result<Value, StoreError> {
    match resolution {
        Resolution::Local => Ok(item.local_data.clone()),
        Resolution::Remote => Ok(item.remote_data.clone()),
        Resolution::Merge => Ok(policy.merge(&item.local_data, &item.remote_data)),
        Resolution::Manual => merged_data.ok_or(StoreError::MissingMergeData),
    }
}
