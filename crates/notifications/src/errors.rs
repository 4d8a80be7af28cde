//! # Notification Errors

use crate::kinds::NotificationKind;
use remote_gateway::GatewayError;
use thiserror::Error;

/// Errors raised while building or sending a notification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    /// The recipient address is not usable.
    #[error("Invalid recipient address: {0:?}")]
    InvalidRecipient(String),

    /// The data object does not fit the notification kind.
    #[error("Invalid {kind} payload: {message}")]
    Payload {
        /// Kind being built.
        kind: NotificationKind,
        /// Decoder message.
        message: String,
    },

    /// The gateway refused or failed the send.
    #[error("Notification dispatch failed: {0}")]
    Dispatch(#[from] GatewayError),
}
