//! # Sync Engine
//!
//! Loads a user's compliance data from the gateway and writes record
//! updates back optimistically.
//!
//! ## Optimistic Writes
//!
//! 1. The patch is applied to the cached record and a pending write is
//!    registered for that record.
//! 2. The patch is sent to the gateway.
//! 3. Every confirmed row's `updated_at` is remembered so its feed echo
//!    is not mistaken for a foreign edit.
//! 4. When the last write in flight for the record finishes, the newest
//!    confirmed row replaces the optimistic copy. If none succeeded the
//!    record is re-fetched (or the pre-write copy restored).
//! 5. A failed write queues a `data_conflict` carrying the server copy.

use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::ComplianceStore;
use crate::domain::{NewConflict, RecordPatch, SettledWrite, StoreError};
use compliance_types::{
    decode_row, decode_rows, tables, ChangeKind, ComplianceRecord, ComplianceTier, RecordId,
    RequirementTemplate, SyncStatus, TierSummary, UserId, UserRole,
};
use remote_gateway::Filter;
use store_bus::StoreEvent;
use store_telemetry::metrics;

/// The three collections fetched by a full load.
struct Collections {
    records: Vec<ComplianceRecord>,
    templates: Vec<RequirementTemplate>,
    summaries: Vec<TierSummary>,
}

impl ComplianceStore {
    /// Record the user's identity, load their data and start real-time sync.
    ///
    /// Failures are stored in `error` and returned; nothing is retried.
    pub async fn initialize(
        &self,
        user_id: impl Into<UserId>,
        role: UserRole,
        tier: ComplianceTier,
    ) -> Result<(), StoreError> {
        let user_id = user_id.into();
        info!(user = %user_id, role = role.as_str(), tier = tier.as_str(), "Initializing compliance store");

        self.set_state(|s| {
            s.user_id = Some(user_id.clone());
            s.user_role = Some(role);
            s.user_tier = Some(tier);
            s.is_loading = true;
            s.error = None;
        });

        let result = match self.load_user_compliance_data(&user_id).await {
            Ok(()) => self.start_real_time_sync().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.set_state(|s| s.is_loading = false);
                info!(user = %user_id, "Compliance store initialized");
                Ok(())
            }
            Err(err) => {
                error!(user = %user_id, error = %err, "Compliance store initialization failed");
                let message = err.to_string();
                self.set_state(|s| {
                    s.is_loading = false;
                    s.error = Some(message.clone());
                });
                self.inner.bus.emit(StoreEvent::ErrorRaised { message });
                Err(err)
            }
        }
    }

    /// Fetch records, templates and tier summaries and replace the cache.
    ///
    /// Records with a write in flight keep their optimistic copy. On failure
    /// the stale data stays in place and the error is logged to
    /// `sync_errors`.
    pub async fn load_user_compliance_data(&self, user_id: &UserId) -> Result<(), StoreError> {
        let started = Instant::now();
        self.set_sync_status(SyncStatus::Syncing);

        let state = self.get_state();
        let (role, tier) = (state.user_role, state.user_tier);
        drop(state);

        match self.fetch_collections(user_id, role, tier).await {
            Ok(collections) => {
                let pending = self.inner.pending.lock().record_ids();
                let record_count = collections.records.len();
                self.set_state(|s| {
                    let records = collections
                        .records
                        .into_iter()
                        .map(|fresh| {
                            if pending.contains(&fresh.id) {
                                s.record(&fresh.id).cloned().unwrap_or(fresh)
                            } else {
                                fresh
                            }
                        })
                        .collect();
                    s.user_compliance_records = records;
                    s.requirement_templates = collections.templates;
                    s.tier_summaries = collections.summaries;
                    s.sync_status = SyncStatus::Idle;
                    s.last_sync_time = Some(Utc::now());
                });
                self.inner.bus.emit(StoreEvent::SyncStatusChanged {
                    status: SyncStatus::Idle,
                });
                self.inner.bus.emit(StoreEvent::RecordsReloaded {
                    user_id: user_id.clone(),
                    record_count,
                });
                metrics::record_sync("success", started.elapsed());
                info!(
                    user = %user_id,
                    records = record_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Compliance data loaded"
                );
                Ok(())
            }
            Err(err) => {
                let status = match &err {
                    StoreError::Gateway(e) if e.is_unavailable() => SyncStatus::Offline,
                    _ => SyncStatus::Error,
                };
                let cap = self.inner.config.max_sync_errors;
                let message = format!("Failed to load compliance data: {err}");
                self.set_state(|s| {
                    s.sync_status = status;
                    s.push_sync_error(message, cap);
                });
                self.inner.bus.emit(StoreEvent::SyncStatusChanged { status });
                metrics::record_sync(status.as_str(), started.elapsed());
                warn!(user = %user_id, status = status.as_str(), error = %err, "Compliance data load failed");
                Err(err)
            }
        }
    }

    /// Reload every collection for the current user.
    pub async fn refresh_all_data(&self) -> Result<(), StoreError> {
        let user_id = self.current_user()?;
        self.load_user_compliance_data(&user_id).await
    }

    /// Manual reload requested by the user.
    pub async fn force_sync_now(&self) -> Result<(), StoreError> {
        info!("Manual sync requested");
        self.refresh_all_data().await
    }

    /// Apply `patch` to a record optimistically and write it remotely.
    ///
    /// Returns the record as confirmed by the gateway.
    pub async fn update_compliance_record(
        &self,
        record_id: &RecordId,
        patch: RecordPatch,
    ) -> Result<ComplianceRecord, StoreError> {
        self.write_record(record_id, patch, true).await
    }

    /// Optimistic write shared by `update_compliance_record` and conflict
    /// resolution. `queue_conflict` controls whether a failure is queued.
    pub(crate) async fn write_record(
        &self,
        record_id: &RecordId,
        patch: RecordPatch,
        queue_conflict: bool,
    ) -> Result<ComplianceRecord, StoreError> {
        let current = self
            .get_state()
            .record(record_id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(record_id.clone()))?;
        let optimistic = patch.apply_to(&current)?;

        let (seq, in_flight) = {
            let mut pending = self.inner.pending.lock();
            let seq = pending.begin(current);
            (seq, pending.in_flight(record_id))
        };
        self.set_state(|s| {
            s.upsert_record(optimistic.clone());
        });
        self.inner.bus.emit(StoreEvent::RecordChanged {
            record_id: record_id.clone(),
            kind: ChangeKind::Update,
        });
        debug!(record = %record_id, seq, in_flight, columns = ?patch.columns().collect::<Vec<_>>(), "Optimistic update applied");

        match self.send_patch(record_id, patch).await {
            Ok(confirmed) => {
                metrics::record_remote_write(true);
                match self.settle_write(record_id, seq, Some(confirmed.clone())) {
                    Some(settled) => self.replay_deferred(settled.deferred),
                    None => debug!(record = %record_id, seq, "Other writes to record still in flight"),
                }
                Ok(confirmed)
            }
            Err(err) => {
                metrics::record_remote_write(false);
                warn!(record = %record_id, seq, error = %err, "Remote write failed");

                let remote = match self.settle_write(record_id, seq, None) {
                    Some(settled) => {
                        let remote = match settled.confirmed {
                            Some(row) => Some(row),
                            None => self.reconcile_record(record_id, settled.base).await,
                        };
                        self.replay_deferred(settled.deferred);
                        remote
                    }
                    // Other writes own the cache; still report what the
                    // server holds.
                    None => match self.fetch_record(record_id).await {
                        Ok(found) => found,
                        Err(fetch_err) => {
                            debug!(record = %record_id, error = %fetch_err, "Refetch after failed write failed");
                            None
                        }
                    },
                };

                if queue_conflict {
                    let local = serde_json::to_value(&optimistic).unwrap_or(Value::Null);
                    let remote = remote
                        .and_then(|r| serde_json::to_value(&r).ok())
                        .unwrap_or(Value::Null);
                    self.add_conflict(NewConflict::data(record_id.clone(), local, remote));
                }
                Err(err)
            }
        }
    }

    /// Finish write `seq`. When it was the last one in flight for the
    /// record, the newest confirmed row replaces the optimistic copy.
    ///
    /// The stamp, the settle and the cache swap happen under the pending
    /// lock, so the feed never sees one without the others.
    pub(crate) fn settle_write(
        &self,
        record_id: &RecordId,
        seq: u64,
        confirmed: Option<ComplianceRecord>,
    ) -> Option<SettledWrite> {
        let (settled, update) = {
            let mut pending = self.inner.pending.lock();
            let settled = pending.finish(record_id, seq, confirmed)?;
            let update = settled.confirmed.clone().map(|row| {
                self.swap_state(|s| {
                    s.upsert_record(row);
                })
                .0
            });
            (settled, update)
        };
        if let Some(update) = update {
            self.publish(update);
        }
        Some(settled)
    }

    async fn send_patch(
        &self,
        record_id: &RecordId,
        patch: RecordPatch,
    ) -> Result<ComplianceRecord, StoreError> {
        let filter = Filter::all().eq("id", record_id.as_str());
        let rows = self
            .inner
            .gateway
            .update(tables::COMPLIANCE_RECORDS, &filter, patch.into_row())
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::RecordNotFound(record_id.clone()))?;
        Ok(decode_row(row)?)
    }

    /// Restore one record after a failed write.
    ///
    /// The server copy is preferred; `base` is used when it cannot be
    /// fetched. A record the server no longer has is removed. Nothing
    /// happens if a newer write to the record started in the meantime.
    async fn reconcile_record(
        &self,
        record_id: &RecordId,
        base: ComplianceRecord,
    ) -> Option<ComplianceRecord> {
        let restored = match self.fetch_record(record_id).await {
            Ok(found) => found,
            Err(err) => {
                debug!(record = %record_id, error = %err, "Refetch failed, restoring pre-write copy");
                Some(base)
            }
        };

        if self.inner.pending.lock().is_pending(record_id) {
            debug!(record = %record_id, "Newer write in flight, skipping reconcile");
            return restored;
        }

        self.set_state(|s| match &restored {
            Some(record) => {
                s.upsert_record(record.clone());
            }
            None => {
                s.remove_record(record_id);
            }
        });
        info!(record = %record_id, removed = restored.is_none(), "Record reconciled after failed write");
        restored
    }

    /// The server copy of one record, `None` when it no longer exists.
    pub(crate) async fn fetch_record(
        &self,
        record_id: &RecordId,
    ) -> Result<Option<ComplianceRecord>, StoreError> {
        let filter = Filter::all().eq("id", record_id.as_str());
        let rows = self
            .inner
            .gateway
            .select(tables::COMPLIANCE_RECORDS, &filter)
            .await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(decode_row(row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_collections(
        &self,
        user_id: &UserId,
        role: Option<UserRole>,
        tier: Option<ComplianceTier>,
    ) -> Result<Collections, StoreError> {
        let gateway = &self.inner.gateway;
        let by_user = Filter::all().eq("user_id", user_id.as_str());

        let records = decode_rows(gateway.select(tables::COMPLIANCE_RECORDS, &by_user).await?)?;

        let mut templates: Vec<RequirementTemplate> = match (role, tier) {
            (Some(role), Some(tier)) => {
                let filter = Filter::all()
                    .eq("role", role.as_str())
                    .eq("tier", tier.as_str());
                decode_rows(gateway.select(tables::REQUIREMENT_TEMPLATES, &filter).await?)?
            }
            _ => Vec::new(),
        };
        templates.sort_by_key(|t| t.display_order);

        let summaries = decode_rows(gateway.select(tables::TIER_SUMMARIES, &by_user).await?)?;

        Ok(Collections {
            records,
            templates,
            summaries,
        })
    }

    fn set_sync_status(&self, status: SyncStatus) {
        self.set_state(|s| s.sync_status = status);
        self.inner.bus.emit(StoreEvent::SyncStatusChanged { status });
    }

    /// Stop background work, drop listeners and reset the snapshot.
    pub fn cleanup(&self) {
        self.stop_real_time_sync();
        self.drop_listeners();

        let components = self.get_state().component_states.len();
        if components > 0 {
            metrics::record_component_delta(-(components as f64));
        }

        let abandoned = {
            let mut pending = self.inner.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if abandoned > 0 {
            debug!(records = abandoned, "Dropping bookkeeping for in-flight writes");
        }
        self.inner.shared.write().clear();
        self.inner.performance.lock().clear();
        self.reset_state();
        info!(
            events_emitted = self.inner.bus.events_published(),
            bus_subscribers = self.inner.bus.subscriber_count(),
            "Compliance store cleaned up"
        );
    }
}
