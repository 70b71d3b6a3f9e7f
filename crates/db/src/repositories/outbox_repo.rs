//! Repository for the `notification_outbox` table.

use sqlx::{PgConnection, PgExecutor};
use excursions_core::notification::Notification;
use excursions_core::types::{DbId, Timestamp};

use crate::models::outbox::{
    OutboxMessage, OUTBOX_STATUS_FAILED, OUTBOX_STATUS_PENDING, OUTBOX_STATUS_SENT,
};

/// Column list for `notification_outbox` queries.
const COLUMNS: &str = "\
    id, template, recipient, context, activity_id, status, attempts, \
    next_attempt_at, last_error, sent_at, created_at";

/// Provides the enqueue/claim/complete cycle of the notification outbox.
pub struct OutboxRepo;

impl OutboxRepo {
    /// Enqueue notifications. Call inside the transaction of the change that
    /// produced them so they only become visible on commit.
    pub async fn enqueue(
        conn: &mut PgConnection,
        activity_id: Option<DbId>,
        notifications: &[Notification],
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;
        for notification in notifications {
            let result = sqlx::query(
                "INSERT INTO notification_outbox (template, recipient, context, activity_id) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(notification.template.as_str())
            .bind(&notification.recipient)
            .bind(&notification.context)
            .bind(activity_id)
            .execute(&mut *conn)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Claim up to `limit` due messages.
    ///
    /// Claimed rows have their attempt counter bumped and are pushed
    /// `lease_secs` into the future, so a crashed relay's messages become
    /// due again. `SKIP LOCKED` keeps concurrent relays from claiming the
    /// same rows.
    pub async fn claim_due<'e, E>(
        executor: E,
        limit: i64,
        lease_secs: i64,
    ) -> Result<Vec<OutboxMessage>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE notification_outbox \
             SET attempts = attempts + 1, \
                 next_attempt_at = NOW() + make_interval(secs => $3) \
             WHERE id IN ( \
                 SELECT id FROM notification_outbox \
                 WHERE status = $1 AND next_attempt_at <= NOW() \
                 ORDER BY next_attempt_at ASC, id ASC \
                 LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboxMessage>(&query)
            .bind(OUTBOX_STATUS_PENDING)
            .bind(limit)
            .bind(lease_secs as f64)
            .fetch_all(executor)
            .await
    }

    /// Number of messages still waiting for delivery.
    pub async fn count_pending<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE status = $1")
            .bind(OUTBOX_STATUS_PENDING)
            .fetch_one(executor)
            .await
    }

    /// Mark a message delivered.
    pub async fn mark_sent<'e, E>(executor: E, id: DbId) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE notification_outbox SET status = $2, sent_at = NOW(), last_error = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(OUTBOX_STATUS_SENT)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Record a failed attempt and schedule the next one.
    pub async fn schedule_retry<'e, E>(
        executor: E,
        id: DbId,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE notification_outbox SET last_error = $2, next_attempt_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Give up on a message after its final attempt.
    pub async fn mark_failed<'e, E>(executor: E, id: DbId, error: &str) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE notification_outbox SET status = $2, last_error = $3 WHERE id = $1")
            .bind(id)
            .bind(OUTBOX_STATUS_FAILED)
            .bind(error)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Messages enqueued for an activity, oldest first.
    pub async fn list_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
    ) -> Result<Vec<OutboxMessage>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_outbox \
             WHERE activity_id = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, OutboxMessage>(&query)
            .bind(activity_id)
            .fetch_all(executor)
            .await
    }
}
