//! Outbound message channels used by the notification relay.

use std::future::Future;

pub mod email;

use email::EmailError;

/// A channel able to deliver one plain-text message.
pub trait MessageSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), EmailError>> + Send;
}

/// Sender used when SMTP is not configured: every message is logged and
/// reported as delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

impl MessageSender for LogDelivery {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        tracing::info!(to, subject, body, "SMTP not configured, notification logged only");
        Ok(())
    }
}
