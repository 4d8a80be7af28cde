//! # Sync and Conflict Vocabulary
//!
//! Small enums shared between the store and its event bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Synchronisation state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No sync in flight; data is as fresh as `last_sync_time`.
    #[default]
    Idle,
    /// A load is in flight.
    Syncing,
    /// The last load failed.
    Error,
    /// The backend could not be reached.
    Offline,
}

impl SyncStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a queued conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(pub Uuid);

impl ConflictId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of disagreement a conflict records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// A local write was rejected by the backend.
    DataConflict,
    /// Component or shared state disagreed.
    StateConflict,
    /// An incoming change carried a different version than the cached copy.
    VersionConflict,
}

impl ConflictType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataConflict => "data_conflict",
            Self::StateConflict => "state_conflict",
            Self::VersionConflict => "version_conflict",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a conflict is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the client value.
    Local,
    /// Keep the server value.
    Remote,
    /// Field-level merge of both values.
    Merge,
    /// Caller-supplied value.
    Manual,
}

impl Resolution {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
