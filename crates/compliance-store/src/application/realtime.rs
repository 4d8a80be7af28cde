//! # Real-Time Sync
//!
//! Follows the row-change feed for the current user's records and,
//! optionally, reloads everything on a fixed interval.
//!
//! ## Collision Detection
//!
//! An `UPDATE` whose `updated_at` matches the cached record replaces it. A
//! mismatch queues a `version_conflict` and leaves the cache alone.
//!
//! Rows this store wrote itself come back on the feed too. Their
//! `updated_at` stamps are remembered when the gateway confirms the write,
//! and a matching `UPDATE` is taken as an echo: it never conflicts and only
//! replaces the cache when nothing newer is there. While a write to a
//! record is in flight, its updates are held back and re-checked once the
//! last write to it finishes.

use chrono::Utc;
use serde_json::Value;
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::store::{BackgroundTask, StoreInner};
use super::ComplianceStore;
use crate::domain::{DeferredChange, NewConflict, StoreError, SubscriptionInfo};
use compliance_types::{
    decode_row, tables, ChangeKind, ComplianceRecord, ConflictId, RecordId, RowChange,
};
use remote_gateway::{ChangeFeed, Filter};
use store_bus::StoreEvent;
use store_telemetry::metrics;

/// Name of the periodic reconcile task in `active_subscriptions`.
pub const AUTO_SYNC_TASK: &str = "auto-sync";

/// What `apply_row_change` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The cached record was inserted or replaced.
    Applied(RecordId),
    /// The cached record was removed.
    Removed(RecordId),
    /// A version conflict was queued; the cache is unchanged.
    Conflict(ConflictId),
    /// A write to the record is in flight; the event is re-checked when it
    /// settles.
    Deferred(RecordId),
    /// The event did not concern cached records.
    Ignored,
}

impl ComplianceStore {
    /// Open the change feed for the current user and start the periodic
    /// reconcile task. Previously started tasks are stopped first.
    pub async fn start_real_time_sync(&self) -> Result<(), StoreError> {
        let user_id = self.current_user()?;
        self.stop_real_time_sync();

        let channel = format!("{}-{}", self.inner.config.realtime_channel_prefix, user_id);
        let filter = Filter::all().eq("user_id", user_id.as_str());
        let feed = self
            .inner
            .gateway
            .subscribe(&channel, tables::COMPLIANCE_RECORDS, &filter)
            .await?;

        let weak = std::sync::Arc::downgrade(&self.inner);
        let mut started = vec![(
            BackgroundTask {
                name: channel.clone(),
                handle: tokio::spawn(run_change_feed(weak.clone(), feed)),
            },
            Some(tables::COMPLIANCE_RECORDS.to_string()),
        )];

        if let Some(interval) = self.inner.config.auto_sync_interval() {
            started.push((
                BackgroundTask {
                    name: AUTO_SYNC_TASK.to_string(),
                    handle: tokio::spawn(run_periodic_sync(weak, interval)),
                },
                None,
            ));
        }

        let now = Utc::now();
        let infos: Vec<SubscriptionInfo> = started
            .iter()
            .map(|(task, table)| SubscriptionInfo {
                name: task.name.clone(),
                table: table.clone(),
                opened_at: now,
            })
            .collect();
        self.inner
            .tasks
            .lock()
            .extend(started.into_iter().map(|(task, _)| task));

        self.set_state(|s| {
            for info in infos {
                s.active_subscriptions.insert(info.name.clone(), info);
            }
        });
        self.inner.bus.emit(StoreEvent::RealtimeStarted {
            channel: channel.clone(),
        });
        info!(
            channel = %channel,
            auto_sync_secs = self.inner.config.auto_sync_interval_secs,
            "Real-time sync started"
        );
        Ok(())
    }

    /// Abort the change feed and periodic reconcile tasks.
    pub fn stop_real_time_sync(&self) {
        let tasks: Vec<BackgroundTask> = self.inner.tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }

        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        for task in tasks {
            task.handle.abort();
        }

        self.set_state(|s| {
            for name in &names {
                s.active_subscriptions.remove(name);
            }
        });
        for name in names.into_iter().filter(|n| n != AUTO_SYNC_TASK) {
            self.inner.bus.emit(StoreEvent::RealtimeStopped {
                channel: name.clone(),
            });
            info!(channel = %name, "Real-time sync stopped");
        }
    }

    /// Apply one row-change event to the cache.
    pub fn apply_row_change(&self, change: RowChange) -> Result<ChangeOutcome, StoreError> {
        if change.table != tables::COMPLIANCE_RECORDS {
            return Ok(ChangeOutcome::Ignored);
        }
        metrics::record_realtime_event(change.kind.as_str());

        let outcome = match change.kind {
            ChangeKind::Insert => {
                let record = decode_incoming(change.new)?;
                let id = record.id.clone();
                self.set_state(|s| {
                    s.upsert_record(record);
                });
                ChangeOutcome::Applied(id)
            }
            ChangeKind::Delete => {
                let id = change
                    .row_id()
                    .map(RecordId::from)
                    .ok_or_else(|| StoreError::Decode("delete event without id".into()))?;
                if self.get_state().record(&id).is_none() {
                    return Ok(ChangeOutcome::Ignored);
                }
                self.set_state(|s| {
                    s.remove_record(&id);
                });
                ChangeOutcome::Removed(id)
            }
            ChangeKind::Update => {
                let remote = Value::Object(change.new.clone().unwrap_or_default());
                let incoming = decode_incoming(change.new)?;
                self.apply_update(incoming, remote)
            }
        };

        if let ChangeOutcome::Applied(id) | ChangeOutcome::Removed(id) = &outcome {
            self.inner.bus.emit(StoreEvent::RecordChanged {
                record_id: id.clone(),
                kind: change.kind,
            });
            debug!(record = %id, kind = change.kind.as_str(), "Row change applied");
        }
        Ok(outcome)
    }

    fn apply_update(&self, incoming: ComplianceRecord, remote: Value) -> ChangeOutcome {
        let id = incoming.id.clone();
        let echo = {
            let mut pending = self.inner.pending.lock();
            if pending.take_confirmed(&id, incoming.updated_at) {
                Some(pending.is_pending(&id))
            } else if pending.defer(DeferredChange {
                incoming: incoming.clone(),
                remote: remote.clone(),
            }) {
                debug!(record = %id, "Write in flight, update deferred");
                return ChangeOutcome::Deferred(id);
            } else {
                None
            }
        };
        let cached = self.get_state().record(&id).cloned();

        if let Some(in_flight) = echo {
            let superseded = in_flight
                || cached
                    .as_ref()
                    .is_some_and(|c| c.updated_at >= incoming.updated_at);
            if superseded {
                debug!(record = %id, "Echo of own write already superseded");
                return ChangeOutcome::Ignored;
            }
            self.set_state(|s| {
                s.upsert_record(incoming);
            });
            return ChangeOutcome::Applied(id);
        }

        let accept = match &cached {
            None => true,
            Some(cached) => cached.updated_at == incoming.updated_at,
        };
        if accept {
            self.set_state(|s| {
                s.upsert_record(incoming);
            });
            return ChangeOutcome::Applied(id);
        }

        let local = cached
            .and_then(|c| serde_json::to_value(&c).ok())
            .unwrap_or(Value::Null);
        warn!(record = %id, "Version conflict on real-time update");
        ChangeOutcome::Conflict(self.add_conflict(NewConflict::version(id, local, remote)))
    }

    /// Re-check updates held back while writes to a record were in flight.
    ///
    /// Updates older than the settled cache entry were overwritten on the
    /// server by our write and are dropped.
    pub(crate) fn replay_deferred(&self, changes: Vec<DeferredChange>) {
        for DeferredChange { incoming, remote } in changes {
            let id = incoming.id.clone();
            let stale = self
                .get_state()
                .record(&id)
                .is_some_and(|c| c.updated_at > incoming.updated_at);
            if stale {
                // Spend the stamp when the row was one of ours.
                self.inner.pending.lock().take_confirmed(&id, incoming.updated_at);
                debug!(record = %id, "Deferred update superseded by own write");
                continue;
            }
            let outcome = self.apply_update(incoming, remote);
            if let ChangeOutcome::Applied(id) = &outcome {
                self.inner.bus.emit(StoreEvent::RecordChanged {
                    record_id: id.clone(),
                    kind: ChangeKind::Update,
                });
            }
            debug!(record = %id, ?outcome, "Deferred update replayed");
        }
    }
}

fn decode_incoming(row: Option<compliance_types::Row>) -> Result<ComplianceRecord, StoreError> {
    let row = row.ok_or_else(|| StoreError::Decode("change event without row".into()))?;
    Ok(decode_row(row)?)
}

async fn run_change_feed(store: Weak<StoreInner>, mut feed: ChangeFeed) {
    let channel = feed.channel().to_string();
    while let Some(change) = feed.recv().await {
        let Some(inner) = store.upgrade() else {
            break;
        };
        let store = ComplianceStore::from_inner(inner);
        if let Err(err) = store.apply_row_change(change) {
            warn!(channel = %channel, error = %err, "Failed to apply row change");
            store.add_sync_error(format!("Real-time update rejected: {err}"));
        }
    }
    debug!(channel = %channel, "Change feed closed");
}

async fn run_periodic_sync(store: Weak<StoreInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load already ran.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = store.upgrade() else {
            break;
        };
        let store = ComplianceStore::from_inner(inner);
        let Ok(user_id) = store.current_user() else {
            continue;
        };
        debug!(user = %user_id, "Periodic reconcile");
        // Failures are already recorded on the snapshot.
        let _ = store.load_user_compliance_data(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use compliance_types::{encode_row, ComplianceStatus, ConflictType, Resolution, Row, UserId};
    use remote_gateway::InMemoryGateway;
    use chrono::{DateTime, TimeZone};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(id: &str, status: ComplianceStatus, updated: i64) -> ComplianceRecord {
        let mut record =
            ComplianceRecord::new(id, "u1", "cpr", status).with_updated_at(at(updated));
        record.created_at = at(0);
        record
    }

    fn row(record: &ComplianceRecord) -> Row {
        encode_row(record).unwrap()
    }

    fn store_with(records: Vec<ComplianceRecord>) -> ComplianceStore {
        let store = ComplianceStore::new(StoreConfig::for_testing(), Arc::new(InMemoryGateway::new()));
        store.set_state(|s| {
            s.user_id = Some(UserId::from("u1"));
            s.user_compliance_records = records;
        });
        store
    }

    #[test]
    fn test_matching_updates_converge() {
        let store = store_with(vec![record("r1", ComplianceStatus::Pending, 0)]);

        let first = record("r1", ComplianceStatus::Warning, 0);
        let second = record("r1", ComplianceStatus::Compliant, 0);
        store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&first)))
            .unwrap();
        let outcome = store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&second)))
            .unwrap();

        assert_eq!(outcome, ChangeOutcome::Applied(RecordId::from("r1")));
        let state = store.get_state();
        assert_eq!(state.record(&RecordId::from("r1")), Some(&second));
        assert!(state.conflict_queue.is_empty());
    }

    #[test]
    fn test_mismatched_update_queues_version_conflict() {
        let cached = record("r1", ComplianceStatus::Pending, 0);
        let store = store_with(vec![cached.clone()]);

        let incoming = record("r1", ComplianceStatus::Compliant, 60);
        let outcome = store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&incoming)))
            .unwrap();

        assert!(matches!(outcome, ChangeOutcome::Conflict(_)));
        let state = store.get_state();
        assert_eq!(state.record(&RecordId::from("r1")), Some(&cached));
        assert_eq!(state.conflict_queue.len(), 1);
        let conflict = &state.conflict_queue[0];
        assert_eq!(conflict.conflict_type, ConflictType::VersionConflict);
        assert_eq!(conflict.record_id, Some(RecordId::from("r1")));
        assert_eq!(conflict.remote_data["status"], "compliant");
        assert_eq!(conflict.local_data["status"], "pending");
    }

    #[tokio::test]
    async fn test_resolving_remote_adopts_incoming_row() {
        let store = store_with(vec![record("r1", ComplianceStatus::Pending, 0)]);
        let incoming = record("r1", ComplianceStatus::Compliant, 60);
        let ChangeOutcome::Conflict(id) = store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&incoming)))
            .unwrap()
        else {
            panic!("expected a conflict");
        };

        store.resolve_conflict(id, Resolution::Remote, None).await.unwrap();

        let state = store.get_state();
        assert_eq!(state.record(&RecordId::from("r1")), Some(&incoming));
        assert!(state.conflict_queue.is_empty());
    }

    #[test]
    fn test_feed_updates_wait_for_in_flight_write() {
        let base = record("r1", ComplianceStatus::Pending, 0);
        let store = store_with(vec![base.clone()]);
        let id = RecordId::from("r1");

        let seq = store.inner.pending.lock().begin(base);
        store.set_state(|s| {
            s.upsert_record(record("r1", ComplianceStatus::Compliant, 0));
        });

        // Our echo, an edit the write overwrote, and one made after it.
        let echo = record("r1", ComplianceStatus::Compliant, 5);
        let older = record("r1", ComplianceStatus::NonCompliant, 3);
        let newer = record("r1", ComplianceStatus::Warning, 9);
        for update in [&echo, &older, &newer] {
            let outcome = store
                .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(update)))
                .unwrap();
            assert_eq!(outcome, ChangeOutcome::Deferred(id.clone()));
        }
        assert!(store.get_state().conflict_queue.is_empty());

        let settled = store.settle_write(&id, seq, Some(echo.clone())).unwrap();
        assert_eq!(store.get_state().record(&id), Some(&echo));
        store.replay_deferred(settled.deferred);

        let state = store.get_state();
        assert_eq!(state.record(&id), Some(&echo));
        assert_eq!(state.conflict_queue.len(), 1);
        let conflict = &state.conflict_queue[0];
        assert_eq!(conflict.conflict_type, ConflictType::VersionConflict);
        assert_eq!(conflict.remote_data["status"], "warning");
        assert!(!store.inner.pending.lock().take_confirmed(&id, at(5)));
    }

    #[test]
    fn test_echo_during_next_write_ignored() {
        let base = record("r1", ComplianceStatus::Pending, 0);
        let store = store_with(vec![base.clone()]);
        let id = RecordId::from("r1");

        let first = store.inner.pending.lock().begin(base);
        let confirmed = record("r1", ComplianceStatus::Warning, 5);
        store.settle_write(&id, first, Some(confirmed.clone())).unwrap();

        // A second write starts before the first one's echo arrives.
        let second = store.inner.pending.lock().begin(confirmed.clone());
        let outcome = store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&confirmed)))
            .unwrap();
        assert_eq!(outcome, ChangeOutcome::Ignored);

        let settled = store
            .settle_write(&id, second, Some(record("r1", ComplianceStatus::Compliant, 8)))
            .unwrap();
        assert!(settled.deferred.is_empty());
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        assert_eq!(state.record(&id).unwrap().status, ComplianceStatus::Compliant);
    }

    #[test]
    fn test_insert_delete_and_unknown_update() {
        let store = store_with(Vec::new());
        let r1 = record("r1", ComplianceStatus::Pending, 0);
        let r2 = record("r2", ComplianceStatus::Warning, 0);

        store
            .apply_row_change(RowChange::insert(tables::COMPLIANCE_RECORDS, row(&r1)))
            .unwrap();
        store
            .apply_row_change(RowChange::update(tables::COMPLIANCE_RECORDS, None, row(&r2)))
            .unwrap();
        assert_eq!(store.get_state().user_compliance_records.len(), 2);

        let outcome = store
            .apply_row_change(RowChange::delete(tables::COMPLIANCE_RECORDS, row(&r1)))
            .unwrap();
        assert_eq!(outcome, ChangeOutcome::Removed(RecordId::from("r1")));
        assert_eq!(
            store
                .apply_row_change(RowChange::delete(tables::COMPLIANCE_RECORDS, row(&r1)))
                .unwrap(),
            ChangeOutcome::Ignored
        );
        assert_eq!(store.get_state().user_compliance_records, vec![r2]);
    }

    #[test]
    fn test_other_tables_ignored() {
        let store = store_with(Vec::new());
        let outcome = store
            .apply_row_change(RowChange::insert(tables::TIER_SUMMARIES, Row::new()))
            .unwrap();
        assert_eq!(outcome, ChangeOutcome::Ignored);
    }

    #[test]
    fn test_malformed_row_rejected() {
        let store = store_with(Vec::new());
        let mut bad = Row::new();
        bad.insert("id".into(), Value::String("r9".into()));
        assert!(matches!(
            store.apply_row_change(RowChange::insert(tables::COMPLIANCE_RECORDS, bad)),
            Err(StoreError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_start_and_stop_track_subscriptions() {
        let gateway = Arc::new(InMemoryGateway::new());
        let config = StoreConfig {
            auto_sync_interval_secs: 60,
            ..StoreConfig::for_testing()
        };
        let store = ComplianceStore::new(config, gateway.clone());
        assert_eq!(
            store.start_real_time_sync().await,
            Err(StoreError::NotInitialized)
        );

        store.set_state(|s| s.user_id = Some(UserId::from("u1")));
        store.start_real_time_sync().await.unwrap();
        store.start_real_time_sync().await.unwrap();

        let state = store.get_state();
        assert_eq!(state.active_subscriptions.len(), 2);
        assert!(state.active_subscriptions.contains_key("compliance-records-u1"));
        assert!(state.active_subscriptions.contains_key(AUTO_SYNC_TASK));
        assert_eq!(store.inner.tasks.lock().len(), 2);

        store.stop_real_time_sync();
        assert!(store.get_state().active_subscriptions.is_empty());
        assert!(store.inner.tasks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_feed_events_reach_cache() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = ComplianceStore::new(StoreConfig::for_testing(), gateway.clone());
        store.set_state(|s| s.user_id = Some(UserId::from("u1")));
        store.start_real_time_sync().await.unwrap();

        let mut events = store
            .event_bus()
            .subscribe(store_bus::EventFilter::topics(vec![store_bus::EventTopic::Records]));

        let inserted = record("r7", ComplianceStatus::Pending, 0);
        assert_eq!(
            gateway.emit(RowChange::insert(tables::COMPLIANCE_RECORDS, row(&inserted))),
            1
        );
        // Another user's rows are filtered out by the feed.
        let foreign = ComplianceRecord::new("x1", "u2", "cpr", ComplianceStatus::Pending);
        assert_eq!(
            gateway.emit(RowChange::insert(tables::COMPLIANCE_RECORDS, row(&foreign))),
            0
        );

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(StoreEvent::RecordChanged {
                record_id: RecordId::from("r7"),
                kind: ChangeKind::Insert,
            })
        );
        assert_eq!(store.get_state().user_compliance_records, vec![inserted]);
    }
}
