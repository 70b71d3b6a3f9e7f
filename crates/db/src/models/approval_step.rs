//! Approval step rows.

use serde::Serialize;
use sqlx::FromRow;
use excursions_core::approval::{ApprovalStatus, ApprovalStep};
use excursions_core::error::CoreError;
use excursions_core::types::{DbId, Timestamp};
use excursions_core::workflow::StepType;

/// A row from the `approval_steps` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalStepRow {
    pub id: DbId,
    pub activity_id: DbId,
    pub step_type: String,
    pub sequence: i32,
    pub description: String,
    pub status: i16,
    pub skip: bool,
    pub invalidated: bool,
    pub nominated: Option<String>,
    pub username: Option<String>,
    pub timecreated: Timestamp,
    pub timemodified: Timestamp,
}

impl ApprovalStepRow {
    /// Convert into the typed domain step.
    pub fn into_step(self) -> Result<ApprovalStep, CoreError> {
        Ok(ApprovalStep {
            id: self.id,
            activity_id: self.activity_id,
            step_type: StepType::from_str_value(&self.step_type)?,
            sequence: self.sequence,
            description: self.description,
            status: ApprovalStatus::from_i16(self.status)?,
            skip: self.skip,
            invalidated: self.invalidated,
            nominated: self.nominated,
            username: self.username,
            timecreated: self.timecreated,
            timemodified: self.timemodified,
        })
    }
}

/// Convert a batch of rows, failing on the first unknown step type or status.
pub fn into_steps(rows: Vec<ApprovalStepRow>) -> Result<Vec<ApprovalStep>, CoreError> {
    rows.into_iter().map(ApprovalStepRow::into_step).collect()
}
