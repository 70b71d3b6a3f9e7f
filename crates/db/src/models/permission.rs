//! Parent permission rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use excursions_core::error::CoreError;
use excursions_core::permission::{PermissionResponse, ResponseRecord};
use excursions_core::types::{DbId, Timestamp};

/// A row from the `permissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub id: DbId,
    pub activity_id: DbId,
    pub student: String,
    pub parent: String,
    pub response: i16,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Permission {
    pub fn to_record(&self) -> Result<ResponseRecord, CoreError> {
        Ok(ResponseRecord {
            student: self.student.clone(),
            parent: self.parent.clone(),
            response: PermissionResponse::from_i16(self.response)?,
        })
    }
}

/// A (student, parent) pair to create a pending permission row for.
#[derive(Debug, Clone, Deserialize)]
pub struct MentorPair {
    pub student: String,
    pub parent: String,
}
