//! # Notifications
//!
//! Email notifications for the compliance platform.
//!
//! ## Flow
//!
//! ```text
//! Notification ──render(Branding)──→ RenderedEmail ──invoke──→ send-notification
//! ```
//!
//! Notification kinds form a closed set; rendering matches on all of them,
//! so adding a kind without a template does not compile.

pub mod dispatch;
pub mod errors;
pub mod kinds;
pub mod render;

pub use dispatch::{NotificationDispatcher, SEND_NOTIFICATION_FUNCTION};
pub use errors::NotificationError;
pub use kinds::{
    Action, CertificateApproved, CertificateRejected, CertificateRequest, Generic, Invitation,
    Notification, NotificationKind, Welcome,
};
pub use render::{escape_html, Branding, RenderedEmail};
