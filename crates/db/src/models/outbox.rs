//! Notification outbox rows.

use serde::Serialize;
use sqlx::FromRow;
use excursions_core::types::{DbId, Timestamp};

pub const OUTBOX_STATUS_PENDING: &str = "pending";
pub const OUTBOX_STATUS_SENT: &str = "sent";
pub const OUTBOX_STATUS_FAILED: &str = "failed";

/// A row from the `notification_outbox` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutboxMessage {
    pub id: DbId,
    pub template: String,
    pub recipient: String,
    pub context: serde_json::Value,
    pub activity_id: Option<DbId>,
    pub status: String,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub sent_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
