//! # Conflict Queue
//!
//! Conflicts are queued in arrival order and settled one at a time. For
//! record conflicts the chosen payload is applied: `Remote` adopts the
//! server copy directly; every other resolution is written back. A record
//! conflict queued without a server copy is re-fetched on `Remote`, and
//! the record is dropped only if the server no longer has it.

use serde_json::Value;
use tracing::{info, warn};

use super::ComplianceStore;
use crate::domain::{
    invariant_unique_conflicts, resolve_payload, NewConflict, RecordPatch, StoreError,
};
use compliance_types::{ComplianceRecord, ConflictId, Resolution};
use store_bus::StoreEvent;
use store_telemetry::metrics;

impl ComplianceStore {
    /// Queue a conflict, returning its id.
    pub fn add_conflict(&self, conflict: NewConflict) -> ConflictId {
        let item = conflict.into_item();
        let (id, conflict_type, record_id) = (item.id, item.conflict_type, item.record_id.clone());

        self.set_state(|s| {
            s.conflict_queue.push(item);
            debug_assert!(invariant_unique_conflicts(s));
        });
        self.inner.bus.emit(StoreEvent::ConflictQueued {
            conflict_id: id,
            conflict_type,
            record_id: record_id.clone(),
        });
        metrics::record_conflict_queued(conflict_type.as_str());
        warn!(
            conflict = %id,
            conflict_type = conflict_type.as_str(),
            record = ?record_id.as_ref().map(|r| r.as_str()),
            "Conflict queued"
        );
        id
    }

    /// Settle a queued conflict and remove it.
    ///
    /// Returns the payload the resolution settled on. If applying it fails
    /// the conflict stays queued.
    pub async fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        resolution: Resolution,
        merged_data: Option<Value>,
    ) -> Result<Value, StoreError> {
        let item = self
            .get_state()
            .conflict_queue
            .iter()
            .find(|c| c.id == conflict_id)
            .cloned()
            .ok_or(StoreError::ConflictNotFound(conflict_id))?;

        let mut payload = resolve_payload(&item, resolution, merged_data, &self.inner.merge_policy)?;

        if let Some(record_id) = &item.record_id {
            match resolution {
                Resolution::Remote => {
                    let remote = if payload.is_null() {
                        // No server copy was captured; ask again before
                        // treating the record as gone.
                        let fetched = self.fetch_record(record_id).await?;
                        payload = fetched
                            .as_ref()
                            .and_then(|r| serde_json::to_value(r).ok())
                            .unwrap_or(Value::Null);
                        fetched
                    } else {
                        Some(
                            serde_json::from_value::<ComplianceRecord>(payload.clone())
                                .map_err(|e| StoreError::Decode(e.to_string()))?,
                        )
                    };
                    self.set_state(|s| match remote {
                        // Never step back to a copy older than the cache.
                        Some(record)
                            if s.record(record_id)
                                .is_some_and(|c| c.updated_at > record.updated_at) => {}
                        Some(record) => {
                            s.upsert_record(record);
                        }
                        None => {
                            s.remove_record(record_id);
                        }
                    });
                }
                Resolution::Local | Resolution::Merge | Resolution::Manual => {
                    let patch = RecordPatch::from_value(
                        self.inner.merge_policy.strip_server_owned(&payload),
                    )?;
                    self.write_record(record_id, patch, false).await?;
                }
            }
        }

        self.set_state(|s| s.conflict_queue.retain(|c| c.id != conflict_id));
        self.inner.bus.emit(StoreEvent::ConflictResolved {
            conflict_id,
            resolution,
        });
        metrics::record_conflict_resolved(resolution.as_str());
        info!(conflict = %conflict_id, resolution = resolution.as_str(), "Conflict resolved");
        Ok(payload)
    }

    /// Drop every queued conflict.
    pub fn clear_conflicts(&self) {
        let cleared = self.update_state(|s| {
            let count = s.conflict_queue.len();
            s.conflict_queue.clear();
            count
        });
        info!(cleared, "Conflict queue cleared");
    }
}
