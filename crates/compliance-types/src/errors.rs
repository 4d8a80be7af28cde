//! # Error Types
//!
//! Errors raised while converting between rows and entities.

use thiserror::Error;

/// Errors from type conversion and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Role code not recognised.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Tier name not recognised.
    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    /// A row could not be decoded into the target entity.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The value does not serialize to a JSON object.
    #[error("Value is not a JSON object")]
    NotAnObject,
}
