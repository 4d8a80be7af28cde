//! # Performance Tracker
//!
//! Per-key capped histories of render and state-update durations. Purely
//! diagnostic: nothing in the store consults these numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default samples kept per key.
pub const PERFORMANCE_HISTORY: usize = 50;

/// Fixed-capacity FIFO. Pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Empty buffer holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append, returning the evicted item if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recent item.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }
}

/// One timing sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Reduced statistics for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPerformanceStats {
    /// Component id or state-update key.
    pub key: String,
    /// Samples currently held.
    pub sample_count: usize,
    /// Fastest sample.
    pub min_ms: f64,
    /// Arithmetic mean.
    pub avg_ms: f64,
    /// Slowest sample.
    pub max_ms: f64,
    /// Most recent sample.
    pub last_ms: f64,
}

impl ComponentPerformanceStats {
    fn from_history(key: &str, history: &RingBuffer<PerformanceMetric>) -> Option<Self> {
        let last = history.last()?.duration_ms;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for sample in history.iter() {
            min = min.min(sample.duration_ms);
            max = max.max(sample.duration_ms);
            sum += sample.duration_ms;
        }
        Some(Self {
            key: key.to_string(),
            sample_count: history.len(),
            min_ms: min,
            avg_ms: sum / history.len() as f64,
            max_ms: max,
            last_ms: last,
        })
    }
}

/// Diagnostics report returned by `get_performance_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Render statistics by component id, sorted by key.
    pub component_stats: Vec<ComponentPerformanceStats>,
    /// State-update statistics by key, sorted by key.
    pub state_update_stats: Vec<ComponentPerformanceStats>,
    /// Registered components.
    pub component_count: usize,
    /// Render samples recorded since creation.
    pub total_renders: u64,
    /// State-update samples recorded since creation.
    pub total_state_updates: u64,
    /// Length of the JSON-serialized snapshot in bytes.
    pub estimated_state_bytes: usize,
    /// Report time.
    pub generated_at: DateTime<Utc>,
}

/// Which history a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Component render.
    Render,
    /// State update.
    StateUpdate,
}

/// Capped per-key timing histories.
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    capacity: usize,
    renders: HashMap<String, RingBuffer<PerformanceMetric>>,
    state_updates: HashMap<String, RingBuffer<PerformanceMetric>>,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(PERFORMANCE_HISTORY)
    }
}

impl PerformanceTracker {
    /// Tracker keeping `capacity` samples per key.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            renders: HashMap::new(),
            state_updates: HashMap::new(),
        }
    }

    /// Record a sample.
    pub fn record(&mut self, kind: SampleKind, key: &str, duration_ms: f64) {
        let capacity = self.capacity;
        let histories = match kind {
            SampleKind::Render => &mut self.renders,
            SampleKind::StateUpdate => &mut self.state_updates,
        };
        histories
            .entry(key.to_string())
            .or_insert_with(|| RingBuffer::new(capacity))
            .push(PerformanceMetric {
                duration_ms,
                recorded_at: Utc::now(),
            });
    }

    /// Samples held for a key.
    pub fn history_len(&self, kind: SampleKind, key: &str) -> usize {
        self.histories(kind).get(key).map_or(0, RingBuffer::len)
    }

    /// Statistics for one key.
    pub fn stats(&self, kind: SampleKind, key: &str) -> Option<ComponentPerformanceStats> {
        self.histories(kind)
            .get(key)
            .and_then(|h| ComponentPerformanceStats::from_history(key, h))
    }

    /// Statistics for every key of a kind, sorted by key.
    pub fn all_stats(&self, kind: SampleKind) -> Vec<ComponentPerformanceStats> {
        let mut stats: Vec<_> = self
            .histories(kind)
            .iter()
            .filter_map(|(key, h)| ComponentPerformanceStats::from_history(key, h))
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Forget the histories of one component.
    pub fn forget(&mut self, key: &str) {
        self.renders.remove(key);
    }

    /// Drop every history.
    pub fn clear(&mut self) {
        self.renders.clear();
        self.state_updates.clear();
    }

    fn histories(&self, kind: SampleKind) -> &HashMap<String, RingBuffer<PerformanceMetric>> {
        match kind {
            SampleKind::Render => &self.renders,
            SampleKind::StateUpdate => &self.state_updates,
        }
    }
}
