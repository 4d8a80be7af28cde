//! # Gateway Errors
//!
//! Failures reported by the hosted backend.

use thiserror::Error;

/// Gateway error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The session is not allowed to perform the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The table or function does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend rejected the payload.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A serverless function returned an error.
    #[error("Function {name} failed: {message}")]
    Function {
        /// Function name.
        name: String,
        /// Error message returned by the function.
        message: String,
    },

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    /// Whether the failure means the client is offline.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
