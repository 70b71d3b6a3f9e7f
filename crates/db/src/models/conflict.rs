//! Event conflict rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use excursions_core::conflict::{ConflictStatus, StoredConflict};
use excursions_core::error::CoreError;
use excursions_core::types::{DbId, Timestamp};

/// A row from the `event_conflicts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventConflict {
    pub id: DbId,
    pub event_id1: DbId,
    pub event_id2: DbId,
    pub event1_kind: String,
    pub event2_kind: String,
    pub status: i16,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EventConflict {
    pub fn to_stored(&self) -> Result<StoredConflict, CoreError> {
        Ok(StoredConflict {
            id: self.id,
            event_id1: self.event_id1,
            event_id2: self.event_id2,
            status: ConflictStatus::from_i16(self.status)?,
        })
    }
}

/// A conflict as seen from one event, with the other side's summary.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConflictSummary {
    pub conflict_id: DbId,
    pub status: i16,
    pub other_event_id: DbId,
    pub other_kind: String,
    pub other_event_name: String,
    pub other_owner: String,
    pub other_timestart: Timestamp,
    pub other_timeend: Timestamp,
    pub other_activity_id: Option<DbId>,
}

/// Request body for changing a conflict's status.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConflictStatus {
    pub status: i16,
}
