//! # Domain Errors
//!
//! Error types for the compliance store.

use compliance_types::{ConflictId, RecordId, TypeError};
use remote_gateway::GatewayError;
use thiserror::Error;

/// Compliance store error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// An operation needs a user but `initialize` has not run.
    #[error("Store not initialized: no current user")]
    NotInitialized,

    /// The record is not in the cache (or no longer exists remotely).
    #[error("Compliance record not found: {0}")]
    RecordNotFound(RecordId),

    /// The conflict id is not queued.
    #[error("Conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    /// `Manual` resolution requested without merged data.
    #[error("Manual resolution requires merged data")]
    MissingMergeData,

    /// A patch could not be applied to a record.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// A row from the backend could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend call failed.
    #[error("Remote call failed: {0}")]
    Gateway(#[from] GatewayError),

    /// The listener set is full.
    #[error("Listener limit reached ({limit})")]
    ListenerLimit {
        /// Configured maximum.
        limit: usize,
    },

    /// A shared-data key is already bound to a value of another type.
    #[error("Shared data key {key} holds a value of type {existing}")]
    SharedDataTypeMismatch {
        /// Key name.
        key: String,
        /// Type currently stored under the key.
        existing: &'static str,
    },
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_conversion() {
        let err: StoreError = GatewayError::Unavailable("offline".into()).into();
        assert!(matches!(err, StoreError::Gateway(_)));
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_listener_limit_message() {
        let err = StoreError::ListenerLimit { limit: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_type_error_conversion() {
        let err: StoreError = TypeError::NotAnObject.into();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}
