//! Notification outbox relay.
//!
//! [`NotificationRelay`] runs as a background task, periodically claiming
//! due rows from `notification_outbox`, rendering them, and handing them to
//! a [`MessageSender`]. Each send is bounded by a timeout; failures are
//! retried with exponential backoff until the attempt limit is reached.
//! Nothing here can affect the workflow transition that queued the message.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use excursions_core::notification::{recipient_address, render, Template};
use excursions_core::workflow::WorkflowDefinition;
use excursions_db::models::outbox::OutboxMessage;
use excursions_db::repositories::OutboxRepo;
use excursions_db::DbPool;

use crate::delivery::MessageSender;

/// Minutes to wait before retry `n` (1-based): 1, 2, 4, 8, ...
pub fn retry_delay(attempts: i32) -> chrono::Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 10) as u32;
    chrono::Duration::minutes(1_i64 << exponent)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tuning knobs for the relay loop.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Upper bound on a single send.
    pub send_timeout: Duration,
    /// Attempts after which a message is marked failed.
    pub max_attempts: i32,
    /// Domain appended to usernames without a configured address.
    pub email_domain: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 50,
            send_timeout: Duration::from_secs(15),
            max_attempts: 5,
            email_domain: "school.local".to_string(),
        }
    }
}

/// Result of one pass over the outbox.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// NotificationRelay
// ---------------------------------------------------------------------------

/// Background service delivering queued notifications.
pub struct NotificationRelay<S> {
    pool: DbPool,
    definition: Arc<WorkflowDefinition>,
    sender: S,
    config: RelayConfig,
}

impl<S: MessageSender> NotificationRelay<S> {
    pub fn new(
        pool: DbPool,
        definition: Arc<WorkflowDefinition>,
        sender: S,
        config: RelayConfig,
    ) -> Self {
        Self {
            pool,
            definition,
            sender,
            config,
        }
    }

    /// Run the relay loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification relay cancelled");
                    break;
                }
                _ = interval.tick() => {
                    match self.process_batch().await {
                        Ok(stats) if stats != RelayStats::default() => {
                            tracing::info!(
                                sent = stats.sent,
                                retried = stats.retried,
                                failed = stats.failed,
                                "Processed notification outbox"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Failed to process notification outbox"),
                    }
                }
            }
        }
    }

    /// Claim and deliver one batch of due messages.
    pub async fn process_batch(&self) -> Result<RelayStats, sqlx::Error> {
        let lease_secs = (self.config.send_timeout.as_secs() as i64 + 1) * 2;
        let claimed = OutboxRepo::claim_due(&self.pool, self.config.batch_size, lease_secs).await?;

        let mut stats = RelayStats::default();
        for message in &claimed {
            match self.deliver(message).await {
                Ok(()) => {
                    OutboxRepo::mark_sent(&self.pool, message.id).await?;
                    stats.sent += 1;
                }
                Err(error) if message.attempts >= self.config.max_attempts => {
                    tracing::error!(
                        outbox_id = message.id,
                        recipient = %message.recipient,
                        attempts = message.attempts,
                        error = %error,
                        "Giving up on notification"
                    );
                    OutboxRepo::mark_failed(&self.pool, message.id, &error).await?;
                    stats.failed += 1;
                }
                Err(error) => {
                    let next = chrono::Utc::now() + retry_delay(message.attempts);
                    tracing::warn!(
                        outbox_id = message.id,
                        attempts = message.attempts,
                        error = %error,
                        "Notification delivery failed, will retry"
                    );
                    OutboxRepo::schedule_retry(&self.pool, message.id, &error, next).await?;
                    stats.retried += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn deliver(&self, message: &OutboxMessage) -> Result<(), String> {
        let template = Template::from_str_value(&message.template).map_err(|e| e.to_string())?;
        let (subject, body) = render(template, &message.context);
        let to = recipient_address(&self.definition, &message.recipient, &self.config.email_domain);

        match tokio::time::timeout(self.config.send_timeout, self.sender.send(&to, &subject, &body))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "Send timed out after {}s",
                self.config.send_timeout.as_secs()
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
