//! Outbound mail hand-off.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::notifications::MailMessage;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail message has no recipients")]
    NoRecipients,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Records each message through `tracing` instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            to = ?message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "Mail handed off"
        );
        Ok(())
    }
}
