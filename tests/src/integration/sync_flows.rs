//! # Sync Flows
//!
//! Drives a store end to end through the in-memory backend:
//!
//! 1. **Initialize**: identity, full load, change feed opened
//! 2. **Change feed**: inserts, deletes and foreign updates reach the cache
//! 3. **Conflicts**: version conflicts queue and resolve against the backend
//! 4. **Optimistic writes**: confirmed, echoed and rolled back per record
//! 5. **Teardown**: cleanup closes the feed and resets the snapshot

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use compliance_store::{ComplianceStore, RecordPatch, StoreError};
    use compliance_types::{
        tables, ComplianceStatus, ComplianceTier, ConflictType, RecordId, Resolution, SyncStatus,
        UserRole,
    };
    use remote_gateway::{Filter, GatewayError, GatewayOp, RemoteGateway};
    use serde_json::json;
    use store_bus::{EventFilter, EventTopic, StoreEvent};
    use tokio::time::timeout;

    use crate::integration::support::{
        eventually, object, record_row, seeded_gateway, store_over, USER,
    };

    async fn initialized() -> (Arc<remote_gateway::InMemoryGateway>, ComplianceStore) {
        let gateway = seeded_gateway();
        let store = store_over(&gateway);
        store
            .initialize(USER, UserRole::AP, ComplianceTier::Basic)
            .await
            .expect("initialize");
        (gateway, store)
    }

    fn id(value: &str) -> RecordId {
        RecordId::from(value)
    }

    // =========================================================================
    // INITIALIZE
    // =========================================================================

    #[tokio::test]
    async fn test_initialize_loads_and_opens_feed() {
        let gateway = seeded_gateway();
        let store = store_over(&gateway);
        let mut sub = store
            .event_bus()
            .subscribe(EventFilter::topics(vec![EventTopic::Realtime]));

        store
            .initialize(USER, UserRole::AP, ComplianceTier::Basic)
            .await
            .unwrap();

        let state = store.get_state();
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(state.sync_status, SyncStatus::Idle);
        assert_eq!(state.user_compliance_records.len(), 3);
        assert!(state
            .user_compliance_records
            .iter()
            .all(|r| r.user_id.as_str() == USER));
        let order: Vec<_> = state
            .requirement_templates
            .iter()
            .map(|t| t.display_order)
            .collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(state.tier_summaries.len(), 1);
        assert_eq!(state.active_subscriptions.len(), 1);
        assert_eq!(gateway.feed_count(), 1);

        let event = timeout(Duration::from_millis(200), sub.recv())
            .await
            .expect("timeout waiting for realtime event")
            .expect("bus closed");
        assert_eq!(
            event,
            StoreEvent::RealtimeStarted {
                channel: format!("{}-{USER}", store.config().realtime_channel_prefix)
            }
        );
    }

    #[tokio::test]
    async fn test_initialize_offline_reports_error() {
        let gateway = seeded_gateway();
        gateway.set_offline(true);
        let store = store_over(&gateway);

        let err = store
            .initialize(USER, UserRole::AP, ComplianceTier::Basic)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Gateway(GatewayError::Unavailable(_))));

        let state = store.get_state();
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert_eq!(state.sync_status, SyncStatus::Offline);
        assert_eq!(state.sync_errors.len(), 1);
        assert_eq!(gateway.feed_count(), 0);

        // Back online, a manual sync recovers.
        gateway.set_offline(false);
        store.force_sync_now().await.unwrap();
        let state = store.get_state();
        assert_eq!(state.sync_status, SyncStatus::Idle);
        assert_eq!(state.user_compliance_records.len(), 3);
    }

    // =========================================================================
    // CHANGE FEED
    // =========================================================================

    #[tokio::test]
    async fn test_remote_insert_and_delete_reach_cache() {
        let (gateway, store) = initialized().await;

        gateway
            .insert(
                tables::COMPLIANCE_RECORDS,
                record_row("r4", USER, ComplianceStatus::Warning),
            )
            .await
            .unwrap();
        eventually(&store, "remote insert", |s| s.record(&id("r4")).is_some()).await;

        gateway
            .delete(tables::COMPLIANCE_RECORDS, &Filter::all().eq("id", "r1"))
            .await
            .unwrap();
        let state = eventually(&store, "remote delete", |s| s.record(&id("r1")).is_none()).await;
        assert_eq!(state.user_compliance_records.len(), 3);
        assert!(state.conflict_queue.is_empty());
    }

    #[tokio::test]
    async fn test_other_users_rows_are_filtered() {
        let (gateway, store) = initialized().await;

        gateway
            .insert(
                tables::COMPLIANCE_RECORDS,
                record_row("x2", "u2", ComplianceStatus::Compliant),
            )
            .await
            .unwrap();
        gateway
            .insert(
                tables::COMPLIANCE_RECORDS,
                record_row("r5", USER, ComplianceStatus::Compliant),
            )
            .await
            .unwrap();

        // Feed delivery is ordered, so once r5 lands x2 has been skipped.
        let state = eventually(&store, "own insert", |s| s.record(&id("r5")).is_some()).await;
        assert!(state.record(&id("x2")).is_none());
    }

    // =========================================================================
    // CONFLICTS
    // =========================================================================

    #[tokio::test]
    async fn test_foreign_update_queues_conflict_and_remote_wins() {
        let (gateway, store) = initialized().await;
        let cached = store.get_state().record(&id("r2")).cloned().unwrap();
        let mut conflicts = store
            .event_bus()
            .subscribe(EventFilter::topics(vec![EventTopic::Conflicts]));

        gateway
            .update(
                tables::COMPLIANCE_RECORDS,
                &Filter::all().eq("id", "r2"),
                object(json!({"status": "compliant", "notes": "approved by admin"})),
            )
            .await
            .unwrap();

        let state = eventually(&store, "version conflict", |s| !s.conflict_queue.is_empty()).await;
        let conflict = state.conflict_queue[0].clone();
        assert_eq!(conflict.conflict_type, ConflictType::VersionConflict);
        assert_eq!(conflict.record_id, Some(id("r2")));
        assert_eq!(conflict.local_data["status"], "pending");
        assert_eq!(conflict.remote_data["status"], "compliant");
        // The cached copy is left alone until someone decides.
        assert_eq!(state.record(&id("r2")), Some(&cached));

        let queued = timeout(Duration::from_millis(200), conflicts.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(queued, StoreEvent::ConflictQueued { .. }));

        store
            .resolve_conflict(conflict.id, Resolution::Remote, None)
            .await
            .unwrap();
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        let record = state.record(&id("r2")).unwrap();
        assert_eq!(record.status, ComplianceStatus::Compliant);
        assert_eq!(record.notes.as_deref(), Some("approved by admin"));
    }

    #[tokio::test]
    async fn test_local_resolution_writes_back() {
        let (gateway, store) = initialized().await;

        gateway
            .update(
                tables::COMPLIANCE_RECORDS,
                &Filter::all().eq("id", "r3"),
                object(json!({"status": "warning"})),
            )
            .await
            .unwrap();
        let state = eventually(&store, "version conflict", |s| !s.conflict_queue.is_empty()).await;
        let conflict_id = state.conflict_queue[0].id;

        store
            .resolve_conflict(conflict_id, Resolution::Local, None)
            .await
            .unwrap();

        let server = gateway
            .select(tables::COMPLIANCE_RECORDS, &Filter::all().eq("id", "r3"))
            .await
            .unwrap();
        assert_eq!(server[0]["status"], "non_compliant");

        // The write's own echo must not reopen the conflict.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        assert_eq!(
            state.record(&id("r3")).map(|r| r.status),
            Some(ComplianceStatus::NonCompliant)
        );
    }

    #[tokio::test]
    async fn test_manual_resolution_requires_payload() {
        let (gateway, store) = initialized().await;
        gateway
            .update(
                tables::COMPLIANCE_RECORDS,
                &Filter::all().eq("id", "r1"),
                object(json!({"notes": "server note"})),
            )
            .await
            .unwrap();
        let state = eventually(&store, "version conflict", |s| !s.conflict_queue.is_empty()).await;
        let conflict_id = state.conflict_queue[0].id;

        let err = store
            .resolve_conflict(conflict_id, Resolution::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingMergeData));
        assert_eq!(store.get_state().conflict_queue.len(), 1);

        let payload = store
            .resolve_conflict(
                conflict_id,
                Resolution::Manual,
                Some(json!({"status": "warning", "notes": "agreed"})),
            )
            .await
            .unwrap();
        assert_eq!(payload["notes"], "agreed");

        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        let record = state.record(&id("r1")).unwrap();
        assert_eq!(record.status, ComplianceStatus::Warning);
        assert_eq!(record.notes.as_deref(), Some("agreed"));
    }

    // =========================================================================
    // OPTIMISTIC WRITES
    // =========================================================================

    #[tokio::test]
    async fn test_update_confirms_without_self_conflict() {
        let (gateway, store) = initialized().await;

        let confirmed = store
            .update_compliance_record(
                &id("r2"),
                RecordPatch::new()
                    .status(ComplianceStatus::Compliant)
                    .notes("uploaded"),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.status, ComplianceStatus::Compliant);
        assert_eq!(gateway.call_count(GatewayOp::Update), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = store.get_state();
        assert_eq!(state.record(&id("r2")), Some(&confirmed));
        assert!(state.conflict_queue.is_empty());
        assert!(state.compliance_percentage() > 60.0);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back_one_record() {
        let (gateway, store) = initialized().await;
        let before = store.get_state();
        gateway.fail_next(
            GatewayOp::Update,
            GatewayError::Validation("status locked".into()),
        );

        let err = store
            .update_compliance_record(
                &id("r3"),
                RecordPatch::new().status(ComplianceStatus::Compliant),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Gateway(GatewayError::Validation(_))));

        let state = store.get_state();
        assert_eq!(state.record(&id("r3")), before.record(&id("r3")));
        assert_eq!(state.record(&id("r1")), before.record(&id("r1")));
        assert_eq!(state.conflict_queue.len(), 1);
        assert_eq!(state.conflict_queue[0].conflict_type, ConflictType::DataConflict);
        assert_eq!(state.conflict_queue[0].local_data["status"], "compliant");
        assert_eq!(state.conflict_queue[0].remote_data["status"], "non_compliant");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_back_to_back_writes_raise_no_conflict() {
        let (_gateway, store) = initialized().await;

        store
            .update_compliance_record(&id("r1"), RecordPatch::new().status(ComplianceStatus::Warning))
            .await
            .unwrap();
        let second = store
            .update_compliance_record(&id("r1"), RecordPatch::new().notes("second"))
            .await
            .unwrap();

        // Give both echoes time to come back through the feed.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        let record = state.record(&id("r1")).unwrap();
        assert_eq!(record, &second);
        assert_eq!(record.status, ComplianceStatus::Warning);
        assert_eq!(record.notes.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_overlapping_writes_echo_cleanly() {
        let (gateway, store) = initialized().await;
        gateway.delay_next(GatewayOp::Update, Duration::from_millis(40));

        let slow_id = id("r2");
        let slow = store
            .update_compliance_record(&slow_id, RecordPatch::new().status(ComplianceStatus::Warning));
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store
                .update_compliance_record(&id("r2"), RecordPatch::new().notes("overlap"))
                .await
        };
        let (slow, fast) = tokio::join!(slow, fast);
        let slow = slow.unwrap();
        fast.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        // The slow write reached the server last and carries both edits.
        assert_eq!(state.record(&id("r2")), Some(&slow));
        assert_eq!(slow.status, ComplianceStatus::Warning);
        assert_eq!(slow.notes.as_deref(), Some("overlap"));
    }

    #[tokio::test]
    async fn test_superseded_failure_keeps_record_on_remote_resolution() {
        let (gateway, store) = initialized().await;
        gateway.delay_next(GatewayOp::Update, Duration::from_millis(50));
        gateway.fail_next(GatewayOp::Update, GatewayError::Backend("boom".into()));

        let failing_id = id("r1");
        let failing = store
            .update_compliance_record(&failing_id, RecordPatch::new().status(ComplianceStatus::Warning));
        let newer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store
                .update_compliance_record(&id("r1"), RecordPatch::new().notes("newer"))
                .await
        };
        let (failing, newer) = tokio::join!(failing, newer);
        assert!(failing.is_err());
        let newer = newer.unwrap();

        let state = eventually(&store, "data conflict", |s| s.conflict_queue.len() == 1).await;
        let conflict = state.conflict_queue[0].clone();
        assert_eq!(conflict.conflict_type, ConflictType::DataConflict);
        assert!(!conflict.remote_data.is_null());
        assert_eq!(conflict.remote_data["notes"], "newer");

        store
            .resolve_conflict(conflict.id, Resolution::Remote, None)
            .await
            .unwrap();
        let state = store.get_state();
        assert!(state.conflict_queue.is_empty());
        assert_eq!(state.record(&id("r1")), Some(&newer));
    }

    #[tokio::test]
    async fn test_failure_during_slower_write_reports_server_copy() {
        let (gateway, store) = initialized().await;
        gateway.delay_next(GatewayOp::Update, Duration::from_millis(50));

        let slow_id = id("r3");
        let slow = store
            .update_compliance_record(&slow_id, RecordPatch::new().notes("slow"));
        let failing = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            gateway.fail_next(GatewayOp::Update, GatewayError::Validation("locked".into()));
            store
                .update_compliance_record(&id("r3"), RecordPatch::new().status(ComplianceStatus::Compliant))
                .await
        };
        let (slow, failing) = tokio::join!(slow, failing);
        let slow = slow.unwrap();
        assert!(failing.is_err());

        let state = store.get_state();
        assert_eq!(state.conflict_queue.len(), 1);
        let conflict = state.conflict_queue[0].clone();
        // Fetched while the slow write was still in flight.
        assert_eq!(conflict.remote_data["status"], "non_compliant");
        assert_eq!(conflict.local_data["status"], "compliant");
        assert_eq!(state.record(&id("r3")), Some(&slow));

        // The captured copy is older than the cache and does not replace it.
        store
            .resolve_conflict(conflict.id, Resolution::Remote, None)
            .await
            .unwrap();
        assert_eq!(store.get_state().record(&id("r3")), Some(&slow));
    }

    #[tokio::test]
    async fn test_update_unknown_record() {
        let (gateway, store) = initialized().await;
        let err = store
            .update_compliance_record(&id("missing"), RecordPatch::new().notes("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
        assert_eq!(gateway.call_count(GatewayOp::Update), 0);
    }

    // =========================================================================
    // LISTENERS AND TEARDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_listeners_follow_feed_changes() {
        let (gateway, store) = initialized().await;
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let guard = store
            .subscribe(move |state| {
                counter.store(state.user_compliance_records.len(), Ordering::SeqCst);
            })
            .unwrap();

        gateway
            .insert(
                tables::COMPLIANCE_RECORDS,
                record_row("r6", USER, ComplianceStatus::Pending),
            )
            .await
            .unwrap();
        eventually(&store, "insert", |s| s.record(&id("r6")).is_some()).await;
        assert_eq!(seen.load(Ordering::SeqCst), 4);

        guard.unsubscribe();
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_closes_feed_and_resets() {
        let (gateway, store) = initialized().await;
        let _guard = store.subscribe(|_| {}).unwrap();
        store.register_component("dashboard", json!({"tab": "overview"}));

        store.cleanup();

        let state = store.get_state();
        assert!(state.user_id.is_none());
        assert!(state.user_compliance_records.is_empty());
        assert!(state.component_states.is_empty());
        assert!(state.active_subscriptions.is_empty());
        assert_eq!(store.listener_count(), 0);

        timeout(Duration::from_secs(1), async {
            while gateway.feed_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("feed still open after cleanup");

        assert!(matches!(store.current_user(), Err(StoreError::NotInitialized)));
    }
}
