//! Platform event audit rows.

use serde::Serialize;
use sqlx::FromRow;
use excursions_core::types::{DbId, Timestamp};

/// A row from the `platform_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlatformEventRow {
    pub id: DbId,
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
