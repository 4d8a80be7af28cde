//! # Email Templates
//!
//! Every notification renders to a subject plus matching HTML and plain-text
//! bodies inside one branded layout. Interpolated values are HTML-escaped.

use crate::kinds::{Action, Notification};
use serde::{Deserialize, Serialize};

/// Branding applied to every email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    /// Product name shown in the header and subject lines.
    pub app_name: String,
    /// Address shown in the footer.
    pub support_email: String,
    /// Header and button colour.
    pub primary_color: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            app_name: "Compliance Portal".to_string(),
            support_email: "support@example.com".to_string(),
            primary_color: "#1f4e79".to_string(),
        }
    }
}

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

/// Template-independent content of an email.
struct Content {
    subject: String,
    heading: String,
    paragraphs: Vec<String>,
    action: Option<Action>,
}

impl Notification {
    /// Render with `branding`.
    pub fn render(&self, branding: &Branding) -> RenderedEmail {
        let app = &branding.app_name;
        let content = match self {
            Notification::Welcome(n) => Content {
                subject: format!("Welcome to {app}"),
                heading: format!("Welcome, {}!", n.recipient_name),
                paragraphs: vec![format!(
                    "Your {app} account is ready. Sign in to review your compliance requirements."
                )],
                action: Some(Action {
                    label: "Sign in".into(),
                    url: n.login_url.clone(),
                }),
            },
            Notification::Invitation(n) => Content {
                subject: format!("{} invited you to {}", n.inviter_name, n.organization),
                heading: "You're invited".into(),
                paragraphs: vec![format!(
                    "{} has invited you to join {} on {app}.",
                    n.inviter_name, n.organization
                )],
                action: Some(Action {
                    label: "Accept invitation".into(),
                    url: n.accept_url.clone(),
                }),
            },
            Notification::CertificateRequest(n) => Content {
                subject: format!("Certificate request: {}", n.course_name),
                heading: "Certificate awaiting review".into(),
                paragraphs: vec![format!(
                    "{} has completed {} and is waiting for a certificate.",
                    n.requester_name, n.course_name
                )],
                action: Some(Action {
                    label: "Review request".into(),
                    url: n.review_url.clone(),
                }),
            },
            Notification::CertificateApproved(n) => Content {
                subject: format!("Your {} certificate is ready", n.course_name),
                heading: format!("Congratulations, {}!", n.recipient_name),
                paragraphs: vec![format!(
                    "Your certificate for {} has been approved.",
                    n.course_name
                )],
                action: Some(Action {
                    label: "Download certificate".into(),
                    url: n.certificate_url.clone(),
                }),
            },
            Notification::CertificateRejected(n) => {
                let mut paragraphs = vec![format!(
                    "Your certificate request for {} was not approved.",
                    n.course_name
                )];
                if let Some(reason) = n.reason.as_deref().filter(|r| !r.trim().is_empty()) {
                    paragraphs.push(format!("Reason: {reason}"));
                }
                paragraphs.push(format!(
                    "Contact {} if you have questions.",
                    branding.support_email
                ));
                Content {
                    subject: format!("Update on your {} certificate", n.course_name),
                    heading: format!("Hello {},", n.recipient_name),
                    paragraphs,
                    action: None,
                }
            }
            Notification::Generic(n) => Content {
                subject: n.subject.clone(),
                heading: n.subject.clone(),
                paragraphs: n
                    .body
                    .split("\n\n")
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                action: n.action.clone(),
            },
        };

        RenderedEmail {
            html: html_layout(branding, &content),
            text: text_layout(branding, &content),
            subject: content.subject,
        }
    }
}

fn html_layout(branding: &Branding, content: &Content) -> String {
    let color = escape_html(&branding.primary_color);
    let mut body = format!("<h1>{}</h1>\n", escape_html(&content.heading));
    for paragraph in &content.paragraphs {
        body.push_str(&format!("<p>{}</p>\n", escape_html(paragraph)));
    }
    if let Some(action) = &content.action {
        body.push_str(&format!(
            "<p><a href=\"{}\" style=\"background:{color};color:#fff;padding:10px 16px;text-decoration:none;border-radius:4px\">{}</a></p>\n",
            escape_html(&action.url),
            escape_html(&action.label),
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<body style=\"font-family:sans-serif\">\n\
         <div style=\"background:{color};color:#fff;padding:16px\">{app}</div>\n\
         <div style=\"padding:16px\">\n{body}</div>\n\
         <div style=\"color:#666;font-size:12px;padding:16px\">{app} &middot; {support}</div>\n\
         </body>\n</html>\n",
        app = escape_html(&branding.app_name),
        support = escape_html(&branding.support_email),
    )
}

fn text_layout(branding: &Branding, content: &Content) -> String {
    let mut text = format!("{}\n\n", content.heading);
    for paragraph in &content.paragraphs {
        text.push_str(paragraph);
        text.push_str("\n\n");
    }
    if let Some(action) = &content.action {
        text.push_str(&format!("{}: {}\n\n", action.label, action.url));
    }
    text.push_str(&format!("-- \n{} | {}\n", branding.app_name, branding.support_email));
    text
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
