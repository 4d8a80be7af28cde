//! # Dispatch
//!
//! Sends rendered notifications through the gateway's serverless function
//! invocation.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::NotificationError;
use crate::kinds::Notification;
use crate::render::Branding;
use remote_gateway::RemoteGateway;

/// Function invoked to deliver email.
pub const SEND_NOTIFICATION_FUNCTION: &str = "send-notification";

/// Renders notifications and hands them to the gateway.
pub struct NotificationDispatcher<G: ?Sized> {
    gateway: Arc<G>,
    branding: Branding,
    function: String,
}

impl<G: RemoteGateway + ?Sized> NotificationDispatcher<G> {
    /// Dispatcher using the default function name.
    pub fn new(gateway: Arc<G>, branding: Branding) -> Self {
        Self {
            gateway,
            branding,
            function: SEND_NOTIFICATION_FUNCTION.to_string(),
        }
    }

    /// Use another delivery function.
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// Branding applied to rendered emails.
    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Render `notification` and send it to `recipient`.
    ///
    /// Returns the function's response.
    pub async fn send(
        &self,
        recipient: &str,
        notification: &Notification,
    ) -> Result<Value, NotificationError> {
        let recipient = recipient.trim();
        if !is_plausible_address(recipient) {
            return Err(NotificationError::InvalidRecipient(recipient.to_string()));
        }

        let kind = notification.kind();
        let email = notification.render(&self.branding);
        let body = json!({
            "to": recipient,
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
            "type": kind.as_str(),
        });

        match self.gateway.invoke(&self.function, body).await {
            Ok(response) => {
                info!(kind = kind.as_str(), function = %self.function, "Notification sent");
                Ok(response)
            }
            Err(err) => {
                warn!(kind = kind.as_str(), function = %self.function, error = %err, "Notification dispatch failed");
                Err(err.into())
            }
        }
    }
}

fn is_plausible_address(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{CertificateApproved, Welcome};
    use remote_gateway::{GatewayError, GatewayOp, InMemoryGateway};

    fn welcome() -> Notification {
        Notification::Welcome(Welcome {
            recipient_name: "Ada".into(),
            login_url: "https://app.test/login".into(),
        })
    }

    #[tokio::test]
    async fn test_send_invokes_function() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.register_function(SEND_NOTIFICATION_FUNCTION, |_| Ok(json!({"id": "msg-1"})));
        let dispatcher = NotificationDispatcher::new(gateway.clone(), Branding::default());

        let response = dispatcher.send(" ada@example.com ", &welcome()).await.unwrap();
        assert_eq!(response["id"], "msg-1");

        let invocations = gateway.invocations();
        assert_eq!(invocations.len(), 1);
        let (function, body) = &invocations[0];
        assert_eq!(function, SEND_NOTIFICATION_FUNCTION);
        assert_eq!(body["to"], "ada@example.com");
        assert_eq!(body["type"], "WELCOME");
        assert_eq!(body["subject"], "Welcome to Compliance Portal");
        assert!(body["html"].as_str().unwrap().contains("Welcome, Ada!"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_not_sent() {
        let gateway = Arc::new(InMemoryGateway::new());
        let dispatcher = NotificationDispatcher::new(gateway.clone(), Branding::default());

        for bad in ["", "ada", "ada@localhost", "@example.com", "a da@example.com"] {
            assert!(matches!(
                dispatcher.send(bad, &welcome()).await,
                Err(NotificationError::InvalidRecipient(_))
            ));
        }
        assert_eq!(gateway.call_count(GatewayOp::Invoke), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.register_function("mailer", |_| Ok(Value::Null));
        gateway.fail_next(
            GatewayOp::Invoke,
            GatewayError::Function {
                name: "mailer".into(),
                message: "quota exceeded".into(),
            },
        );
        let port: Arc<dyn RemoteGateway> = gateway.clone();
        let dispatcher = NotificationDispatcher::new(port, Branding::default()).with_function("mailer");

        let notification = Notification::CertificateApproved(CertificateApproved {
            recipient_name: "Ada".into(),
            course_name: "CPR".into(),
            certificate_url: "https://app.test/cert/1".into(),
        });
        let err = dispatcher.send("ada@example.com", &notification).await.unwrap_err();
        assert!(matches!(err, NotificationError::Dispatch(GatewayError::Function { .. })));
    }
}
