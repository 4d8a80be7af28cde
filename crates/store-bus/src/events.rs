//! # Store Events
//!
//! Every event the compliance store publishes, and the filters consumers use
//! to select them.

use compliance_types::{ChangeKind, ConflictId, ConflictType, RecordId, Resolution, SyncStatus, UserId};
use serde::{Deserialize, Serialize};

/// All events that can be published on the store bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    // =========================================================================
    // STATE CONTAINER
    // =========================================================================
    /// The snapshot was replaced. `version` increases by one per mutation.
    StateChanged {
        /// Snapshot version after the mutation.
        version: u64,
    },

    // =========================================================================
    // SYNC ENGINE
    // =========================================================================
    /// Sync status transitioned.
    SyncStatusChanged {
        /// New status.
        status: SyncStatus,
    },

    /// A full reload of a user's collections completed.
    RecordsReloaded {
        /// User whose data was loaded.
        user_id: UserId,
        /// Number of compliance records now cached.
        record_count: usize,
    },

    /// A single cached record changed (real-time feed or local write).
    RecordChanged {
        /// Affected record.
        record_id: RecordId,
        /// What happened to it.
        kind: ChangeKind,
    },

    /// A real-time subscription was opened.
    RealtimeStarted {
        /// Channel name.
        channel: String,
    },

    /// A real-time subscription was closed.
    RealtimeStopped {
        /// Channel name.
        channel: String,
    },

    // =========================================================================
    // CONFLICT QUEUE
    // =========================================================================
    /// A conflict was queued.
    ConflictQueued {
        /// Conflict identifier.
        conflict_id: ConflictId,
        /// Conflict type.
        conflict_type: ConflictType,
        /// Record concerned, if any.
        record_id: Option<RecordId>,
    },

    /// A conflict was resolved and removed from the queue.
    ConflictResolved {
        /// Conflict identifier.
        conflict_id: ConflictId,
        /// Resolution applied.
        resolution: Resolution,
    },

    // =========================================================================
    // ERRORS
    // =========================================================================
    /// An error message was recorded on the store.
    ErrorRaised {
        /// Human-readable message.
        message: String,
    },
}

impl StoreEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::StateChanged { .. } => EventTopic::State,
            Self::SyncStatusChanged { .. } | Self::RecordsReloaded { .. } => EventTopic::Sync,
            Self::RecordChanged { .. } => EventTopic::Records,
            Self::RealtimeStarted { .. } | Self::RealtimeStopped { .. } => EventTopic::Realtime,
            Self::ConflictQueued { .. } | Self::ConflictResolved { .. } => EventTopic::Conflicts,
            Self::ErrorRaised { .. } => EventTopic::Errors,
        }
    }

    /// Record this event concerns, if any.
    #[must_use]
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Self::RecordChanged { record_id, .. } => Some(record_id),
            Self::ConflictQueued { record_id, .. } => record_id.as_ref(),
            _ => None,
        }
    }
}

/// Topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Snapshot replacement notifications.
    State,
    /// Load lifecycle.
    Sync,
    /// Per-record changes.
    Records,
    /// Real-time subscription lifecycle.
    Realtime,
    /// Conflict queue changes.
    Conflicts,
    /// Error log changes.
    Errors,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Records to include. Empty means all records; events that concern no
    /// record always pass this check.
    pub record_ids: Vec<RecordId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            record_ids: Vec::new(),
        }
    }

    /// Create a filter for events about specific records.
    #[must_use]
    pub fn for_records(record_ids: Vec<RecordId>) -> Self {
        Self {
            topics: Vec::new(),
            record_ids,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &StoreEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let record_match = self.record_ids.is_empty()
            || event
                .record_id()
                .map_or(true, |id| self.record_ids.contains(id));

        topic_match && record_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_changed(id: &str) -> StoreEvent {
        StoreEvent::RecordChanged {
            record_id: RecordId::from(id),
            kind: ChangeKind::Update,
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(StoreEvent::StateChanged { version: 1 }.topic(), EventTopic::State);
        assert_eq!(record_changed("r1").topic(), EventTopic::Records);
        assert_eq!(
            StoreEvent::ErrorRaised {
                message: "x".into()
            }
            .topic(),
            EventTopic::Errors
        );
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&record_changed("r1")));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Conflicts]);
        assert!(!filter.matches(&record_changed("r1")));
        assert!(filter.matches(&StoreEvent::ConflictResolved {
            conflict_id: ConflictId::generate(),
            resolution: Resolution::Local,
        }));
    }

    #[test]
    fn test_filter_by_record() {
        let filter = EventFilter::for_records(vec![RecordId::from("r1")]);
        assert!(filter.matches(&record_changed("r1")));
        assert!(!filter.matches(&record_changed("r2")));
        // Events without a record are not excluded by a record filter.
        assert!(filter.matches(&StoreEvent::StateChanged { version: 3 }));
    }
}
