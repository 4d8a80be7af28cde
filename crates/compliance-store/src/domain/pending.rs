//! # Pending Writes
//!
//! Tracks in-flight optimistic writes per record. Each write gets a
//! sequence number. A record stays pending until every write to it has
//! finished; the last one to finish settles the record.
//!
//! Two more pieces of bookkeeping hang off the same lock:
//!
//! - change-feed updates that arrive while writes are in flight are
//!   deferred and handed back when the record settles;
//! - `updated_at` stamps of rows the store itself wrote are remembered
//!   until their echo comes back on the feed.

use chrono::{DateTime, Utc};
use compliance_types::{ComplianceRecord, RecordId};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Echo stamps remembered per record. The oldest is forgotten first.
pub const CONFIRMED_STAMP_LIMIT: usize = 32;

/// Deferred feed updates kept per record. The oldest is dropped first.
pub const DEFERRED_CHANGE_LIMIT: usize = 64;

/// A feed update held back while a write to its record was in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredChange {
    /// Decoded row.
    pub incoming: ComplianceRecord,
    /// Raw row, kept for conflict payloads.
    pub remote: Value,
}

/// What a record's writes leave behind once the last one finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledWrite {
    /// The record before the first optimistic edit of the run.
    pub base: ComplianceRecord,
    /// The newest row the server confirmed during the run, if any write
    /// succeeded.
    pub confirmed: Option<ComplianceRecord>,
    /// Feed updates deferred while writes were in flight, oldest first.
    pub deferred: Vec<DeferredChange>,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    in_flight: BTreeSet<u64>,
    base: ComplianceRecord,
    confirmed: Option<ComplianceRecord>,
    deferred: VecDeque<DeferredChange>,
}

/// In-flight writes keyed by record.
#[derive(Debug, Default)]
pub struct PendingWrites {
    next_seq: u64,
    writes: HashMap<RecordId, PendingWrite>,
    confirmed: HashMap<RecordId, VecDeque<DateTime<Utc>>>,
}

impl PendingWrites {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a write to `base.id`, returning its sequence number.
    ///
    /// `base` is the record before the optimistic edit. When a write to the
    /// same record is already in flight its base is kept, since it is the
    /// last copy the server is known to have confirmed.
    pub fn begin(&mut self, base: ComplianceRecord) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.writes
            .entry(base.id.clone())
            .or_insert_with(|| PendingWrite {
                in_flight: BTreeSet::new(),
                base,
                confirmed: None,
                deferred: VecDeque::new(),
            })
            .in_flight
            .insert(seq);
        seq
    }

    /// Finish write `seq` to `id`. `confirmed` is the server row when the
    /// write succeeded; its stamp is remembered for echo matching.
    ///
    /// Returns the settled record once no other write to it is in flight.
    /// Returns `None` while others are, or when `seq` is unknown.
    pub fn finish(
        &mut self,
        id: &RecordId,
        seq: u64,
        confirmed: Option<ComplianceRecord>,
    ) -> Option<SettledWrite> {
        if let Some(row) = &confirmed {
            self.confirm(id, row.updated_at);
        }
        let write = self.writes.get_mut(id)?;
        if !write.in_flight.remove(&seq) {
            return None;
        }
        if let Some(row) = confirmed {
            let newer = write
                .confirmed
                .as_ref()
                .map_or(true, |kept| row.updated_at >= kept.updated_at);
            if newer {
                write.confirmed = Some(row);
            }
        }
        if !write.in_flight.is_empty() {
            return None;
        }
        self.writes.remove(id).map(|w| SettledWrite {
            base: w.base,
            confirmed: w.confirmed,
            deferred: w.deferred.into(),
        })
    }

    /// Whether a write to `id` is in flight.
    pub fn is_pending(&self, id: &RecordId) -> bool {
        self.writes.contains_key(id)
    }

    /// Number of writes to `id` in flight.
    pub fn in_flight(&self, id: &RecordId) -> usize {
        self.writes.get(id).map_or(0, |w| w.in_flight.len())
    }

    /// Hold `change` until the writes in flight for its record settle.
    ///
    /// Returns `false` when nothing is in flight for the record.
    pub fn defer(&mut self, change: DeferredChange) -> bool {
        let Some(write) = self.writes.get_mut(&change.incoming.id) else {
            return false;
        };
        if write.deferred.len() == DEFERRED_CHANGE_LIMIT {
            write.deferred.pop_front();
        }
        write.deferred.push_back(change);
        true
    }

    fn confirm(&mut self, id: &RecordId, updated_at: DateTime<Utc>) {
        let stamps = self.confirmed.entry(id.clone()).or_default();
        if stamps.len() == CONFIRMED_STAMP_LIMIT {
            stamps.pop_front();
        }
        stamps.push_back(updated_at);
    }

    /// Consume a remembered stamp. `true` when the update is our own echo.
    pub fn take_confirmed(&mut self, id: &RecordId, updated_at: DateTime<Utc>) -> bool {
        let Some(stamps) = self.confirmed.get_mut(id) else {
            return false;
        };
        let Some(pos) = stamps.iter().position(|s| *s == updated_at) else {
            return false;
        };
        stamps.remove(pos);
        if stamps.is_empty() {
            self.confirmed.remove(id);
        }
        true
    }

    /// Records with writes in flight.
    pub fn record_ids(&self) -> HashSet<RecordId> {
        self.writes.keys().cloned().collect()
    }

    /// Number of records with writes in flight.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Forget every in-flight write and remembered stamp.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.confirmed.clear();
    }
}
