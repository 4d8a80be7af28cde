//! # Notification Kinds
//!
//! The closed set of notifications the platform sends. Each kind carries its
//! own typed fields; the wire tag selects the kind and unknown tags fall
//! back to [`Notification::Generic`].

use crate::errors::NotificationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wire tag of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// New account.
    Welcome,
    /// Invitation to join an organization.
    Invitation,
    /// A certificate awaits review.
    CertificateRequest,
    /// A certificate was issued.
    CertificateApproved,
    /// A certificate request was declined.
    CertificateRejected,
    /// Anything else.
    Generic,
}

impl NotificationKind {
    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "WELCOME",
            Self::Invitation => "INVITATION",
            Self::CertificateRequest => "CERTIFICATE_REQUEST",
            Self::CertificateApproved => "CERTIFICATE_APPROVED",
            Self::CertificateRejected => "CERTIFICATE_REJECTED",
            Self::Generic => "GENERIC",
        }
    }

    /// Parse a wire tag. Unknown tags map to `Generic`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "WELCOME" => Self::Welcome,
            "INVITATION" => Self::Invitation,
            "CERTIFICATE_REQUEST" => Self::CertificateRequest,
            "CERTIFICATE_APPROVED" => Self::CertificateApproved,
            "CERTIFICATE_REJECTED" => Self::CertificateRejected,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call-to-action link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Button text.
    pub label: String,
    /// Target URL.
    pub url: String,
}

/// Fields of a welcome email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// Recipient's display name.
    pub recipient_name: String,
    /// Sign-in link.
    pub login_url: String,
}

/// Fields of an invitation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Who sent the invitation.
    pub inviter_name: String,
    /// Organization the recipient is invited to.
    pub organization: String,
    /// Acceptance link.
    pub accept_url: String,
}

/// Fields of a certificate review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Person the certificate is for.
    pub requester_name: String,
    /// Course completed.
    pub course_name: String,
    /// Review link.
    pub review_url: String,
}

/// Fields of a certificate approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateApproved {
    /// Recipient's display name.
    pub recipient_name: String,
    /// Course completed.
    pub course_name: String,
    /// Download link.
    pub certificate_url: String,
}

/// Fields of a certificate rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRejected {
    /// Recipient's display name.
    pub recipient_name: String,
    /// Course concerned.
    pub course_name: String,
    /// Reviewer's reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Free-form notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generic {
    /// Subject line.
    pub subject: String,
    /// Plain-text body; blank lines separate paragraphs.
    pub body: String,
    /// Optional link.
    #[serde(default)]
    pub action: Option<Action>,
}

/// A notification ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// New account.
    Welcome(Welcome),
    /// Invitation to join an organization.
    Invitation(Invitation),
    /// A certificate awaits review.
    CertificateRequest(CertificateRequest),
    /// A certificate was issued.
    CertificateApproved(CertificateApproved),
    /// A certificate request was declined.
    CertificateRejected(CertificateRejected),
    /// Anything else.
    Generic(Generic),
}

impl Notification {
    /// Wire tag of this notification.
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Welcome(_) => NotificationKind::Welcome,
            Self::Invitation(_) => NotificationKind::Invitation,
            Self::CertificateRequest(_) => NotificationKind::CertificateRequest,
            Self::CertificateApproved(_) => NotificationKind::CertificateApproved,
            Self::CertificateRejected(_) => NotificationKind::CertificateRejected,
            Self::Generic(_) => NotificationKind::Generic,
        }
    }

    /// Build a notification from a wire tag and its data object.
    pub fn from_payload(tag: &str, data: Value) -> Result<Self, NotificationError> {
        let kind = NotificationKind::from_tag(tag);
        Ok(match kind {
            NotificationKind::Welcome => Self::Welcome(fields(kind, data)?),
            NotificationKind::Invitation => Self::Invitation(fields(kind, data)?),
            NotificationKind::CertificateRequest => Self::CertificateRequest(fields(kind, data)?),
            NotificationKind::CertificateApproved => {
                Self::CertificateApproved(fields(kind, data)?)
            }
            NotificationKind::CertificateRejected => {
                Self::CertificateRejected(fields(kind, data)?)
            }
            NotificationKind::Generic => Self::Generic(fields(kind, data)?),
        })
    }
}

fn fields<T: DeserializeOwned>(kind: NotificationKind, data: Value) -> Result<T, NotificationError> {
    serde_json::from_value(data).map_err(|e| NotificationError::Payload {
        kind,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tags() {
        assert_eq!(
            NotificationKind::from_tag("certificate_approved"),
            NotificationKind::CertificateApproved
        );
        assert_eq!(NotificationKind::from_tag("REMINDER"), NotificationKind::Generic);
        assert_eq!(NotificationKind::Invitation.as_str(), "INVITATION");
        assert_eq!(
            serde_json::to_value(NotificationKind::CertificateRequest).unwrap(),
            "CERTIFICATE_REQUEST"
        );
    }

    #[test]
    fn test_from_payload() {
        let notification = Notification::from_payload(
            "WELCOME",
            json!({"recipient_name": "Ada", "login_url": "https://app.test/login"}),
        )
        .unwrap();
        assert_eq!(notification.kind(), NotificationKind::Welcome);

        let fallback = Notification::from_payload(
            "REMINDER",
            json!({"subject": "Renew CPR", "body": "Due soon."}),
        )
        .unwrap();
        assert!(matches!(fallback, Notification::Generic(ref g) if g.action.is_none()));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = Notification::from_payload("INVITATION", json!({"inviter_name": "Bo"}))
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Payload {
                kind: NotificationKind::Invitation,
                ..
            }
        ));
    }
}
