//! Side effects requested alongside a write and delivered by the workers.

use serde::Serialize;

/// Outbound trackback announcing one of our entries to a remote post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackbackPing {
    /// Trackback endpoint of the remote post.
    pub target_url: String,
    /// Permalink of our entry.
    pub source_url: String,
    pub source_title: String,
    pub source_excerpt: String,
    pub source_blog_name: String,
}

/// Fully composed mail handed to a [`Mailer`](crate::infra::mail::Mailer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Mail(MailMessage),
    Trackback(TrackbackPing),
}
