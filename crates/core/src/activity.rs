//! Activity lifecycle: status codes, editable field snapshot, input
//! validation, and the status transition rules.
//!
//! The status integers are stored and compared by other systems, so the
//! discriminants of [`ActivityStatus`] must never change.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::permission::PermissionKind;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CAMPUS_PRIMARY: &str = "primary";
pub const CAMPUS_SENIOR: &str = "senior";

/// All valid campus values.
pub const VALID_CAMPUSES: &[&str] = &[CAMPUS_PRIMARY, CAMPUS_SENIOR];

pub const ACTIVITY_TYPE_EXCURSION: &str = "excursion";
pub const ACTIVITY_TYPE_INCURSION: &str = "incursion";

/// All valid activity type values.
pub const VALID_ACTIVITY_TYPES: &[&str] = &[ACTIVITY_TYPE_EXCURSION, ACTIVITY_TYPE_INCURSION];

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which campus an activity belongs to. Selects the approval sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Campus {
    Primary,
    Senior,
}

impl Campus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            CAMPUS_PRIMARY => Ok(Self::Primary),
            CAMPUS_SENIOR => Ok(Self::Senior),
            _ => Err(CoreError::Validation(format!(
                "Invalid campus '{s}'. Must be one of: {}",
                VALID_CAMPUSES.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => CAMPUS_PRIMARY,
            Self::Senior => CAMPUS_SENIOR,
        }
    }
}

/// Lifecycle status of an activity. Discriminants are the stored values and
/// the wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum ActivityStatus {
    Autosave = 0,
    Draft = 1,
    InReview = 2,
    Approved = 3,
    Cancelled = 4,
}

impl ActivityStatus {
    pub fn from_i16(value: i16) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Autosave),
            1 => Ok(Self::Draft),
            2 => Ok(Self::InReview),
            3 => Ok(Self::Approved),
            4 => Ok(Self::Cancelled),
            other => Err(CoreError::Internal(format!(
                "Unknown activity status code {other}"
            ))),
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Statuses in which the approval workflow is live.
    pub fn is_under_workflow(self) -> bool {
        matches!(self, Self::InReview | Self::Approved)
    }

    /// Statuses that precede submission for review.
    pub fn is_pre_review(self) -> bool {
        matches!(self, Self::Autosave | Self::Draft)
    }
}

impl From<ActivityStatus> for i16 {
    fn from(status: ActivityStatus) -> Self {
        status.as_i16()
    }
}

impl TryFrom<i16> for ActivityStatus {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_i16(value)
    }
}

/// How an activity row is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Row removed outright (autosaves were never real drafts).
    Hard,
    /// `deleted` flag set, row kept.
    Soft,
}

// ---------------------------------------------------------------------------
// Field snapshot
// ---------------------------------------------------------------------------

/// Every user-editable, persisted field of an activity.
///
/// Field names are the keys used by `invalidated_on_edit` in the workflow
/// configuration, so renaming a field here is a configuration change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFields {
    pub activity_name: String,
    pub campus: Campus,
    pub activity_type: String,
    pub location: String,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
    pub students: Vec<String>,
    pub staff_in_charge: String,
    pub accompanying_staff: Vec<String>,
    pub planning_staff: Vec<String>,
    pub cost: Option<f64>,
    pub transport: String,
    pub details: String,
    pub permissions_type: PermissionKind,
    pub permissions_limit: i32,
    pub permissions_due_by: Option<Timestamp>,
}

impl ActivityFields {
    /// Sort and dedupe the username lists so ordering differences in the
    /// submitted form never register as an edit.
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.students,
            &mut self.accompanying_staff,
            &mut self.planning_staff,
        ] {
            list.sort();
            list.dedup();
        }
        self
    }
}

/// Names of the fields whose values differ between two snapshots.
///
/// Both snapshots are compared through their JSON form so list and
/// optional fields are compared structurally.
pub fn changed_fields(original: &ActivityFields, updated: &ActivityFields) -> BTreeSet<String> {
    let (Ok(serde_json::Value::Object(before)), Ok(serde_json::Value::Object(after))) = (
        serde_json::to_value(original),
        serde_json::to_value(updated),
    ) else {
        return BTreeSet::new();
    };

    after
        .iter()
        .filter(|(key, value)| before.get(key.as_str()) != Some(value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Whether a change set should reset the absence/roll/reminder processing
/// flags consumed by background jobs.
pub fn resets_processing_flags(changed: &BTreeSet<String>) -> bool {
    ["timestart", "timeend", "students"]
        .iter()
        .any(|f| changed.contains(*f))
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Form submission for creating or editing an activity.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivityInput {
    #[validate(length(min = 1, max = 255))]
    pub activity_name: String,
    pub campus: String,
    pub activity_type: String,
    #[serde(default)]
    pub location: String,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
    #[serde(default)]
    pub students: Vec<String>,
    #[validate(length(min = 1))]
    pub staff_in_charge: String,
    #[serde(default)]
    pub accompanying_staff: Vec<String>,
    #[serde(default)]
    pub planning_staff: Vec<String>,
    /// Free-text cost as typed into the form.
    pub cost: Option<String>,
    #[serde(default)]
    pub transport: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub permissions_type: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub permissions_limit: i32,
    pub permissions_due_by: Option<Timestamp>,
}

impl ActivityInput {
    /// Validate the submission and convert it into a field snapshot.
    ///
    /// Runs before any persistence write; every failure is a
    /// [`CoreError::Validation`].
    pub fn into_fields(self) -> Result<ActivityFields, CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_time_range(self.timestart, self.timeend)?;
        validate_activity_type(&self.activity_type)?;

        let campus = Campus::from_str_value(&self.campus)?;
        let cost = parse_cost(self.cost.as_deref())?;
        let permissions_type = match self.permissions_type.as_deref() {
            Some(kind) => PermissionKind::from_str_value(kind)?,
            None => PermissionKind::None,
        };

        Ok(ActivityFields {
            activity_name: self.activity_name.trim().to_string(),
            campus,
            activity_type: self.activity_type,
            location: self.location,
            timestart: self.timestart,
            timeend: self.timeend,
            students: self.students,
            staff_in_charge: self.staff_in_charge,
            accompanying_staff: self.accompanying_staff,
            planning_staff: self.planning_staff,
            cost,
            transport: self.transport,
            details: self.details,
            permissions_type,
            permissions_limit: self.permissions_limit,
            permissions_due_by: self.permissions_due_by,
        }
        .normalized())
    }
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

/// Validate that `end` is strictly after `start`.
pub fn validate_time_range(start: Timestamp, end: Timestamp) -> Result<(), CoreError> {
    if end <= start {
        return Err(CoreError::Validation(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}

/// Validate that an activity type is one of the accepted values.
pub fn validate_activity_type(activity_type: &str) -> Result<(), CoreError> {
    if VALID_ACTIVITY_TYPES.contains(&activity_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid activity type '{activity_type}'. Must be one of: {}",
            VALID_ACTIVITY_TYPES.join(", ")
        )))
    }
}

/// Parse a free-text cost. Blank means no cost; anything else must be a
/// finite, non-negative number (a leading `$` is tolerated).
pub fn parse_cost(raw: Option<&str>) -> Result<Option<f64>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let digits = raw.strip_prefix('$').unwrap_or(raw).trim();
    let value: f64 = digits
        .parse()
        .map_err(|_| CoreError::Validation(format!("Cost '{raw}' is not a number")))?;

    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "Cost '{raw}' must be a non-negative amount"
        )));
    }
    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// Status an activity takes when the owner explicitly saves it.
pub fn status_after_save(current: ActivityStatus) -> ActivityStatus {
    match current {
        ActivityStatus::Autosave => ActivityStatus::Draft,
        other => other,
    }
}

/// Recompute the status of an activity under workflow from whether any
/// unactioned steps remain. Statuses outside the workflow are unchanged.
pub fn derive_status(current: ActivityStatus, has_unactioned: bool) -> ActivityStatus {
    if !current.is_under_workflow() {
        return current;
    }
    if has_unactioned {
        ActivityStatus::InReview
    } else {
        ActivityStatus::Approved
    }
}

/// Guard for "send for review".
pub fn ensure_can_submit(activity_id: DbId, status: ActivityStatus) -> Result<(), CoreError> {
    if status.is_pre_review() {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Activity {activity_id} has already been submitted (status {status:?})"
        )))
    }
}

/// Guard for edits: cancelled activities are frozen.
pub fn ensure_editable(activity_id: DbId, status: ActivityStatus) -> Result<(), CoreError> {
    if status == ActivityStatus::Cancelled {
        return Err(CoreError::Conflict(format!(
            "Activity {activity_id} is cancelled and can no longer be edited"
        )));
    }
    Ok(())
}

/// Guard for cancellation: only activities not yet approved can be cancelled.
pub fn ensure_can_cancel(activity_id: DbId, status: ActivityStatus) -> Result<(), CoreError> {
    match status {
        ActivityStatus::Autosave | ActivityStatus::Draft | ActivityStatus::InReview => Ok(()),
        other => Err(CoreError::Conflict(format!(
            "Activity {activity_id} cannot be cancelled from status {other:?}"
        ))),
    }
}

/// Decide how an activity is deleted, or refuse.
pub fn deletion_mode(activity_id: DbId, status: ActivityStatus) -> Result<DeleteMode, CoreError> {
    match status {
        ActivityStatus::Autosave => Ok(DeleteMode::Hard),
        ActivityStatus::Draft | ActivityStatus::InReview => Ok(DeleteMode::Soft),
        other => Err(CoreError::Conflict(format!(
            "Activity {activity_id} cannot be deleted from status {other:?}"
        ))),
    }
}

/// Whether `username` is the creator, staff in charge, or on the planning or
/// accompanying staff of an activity.
pub fn is_activity_staff(owner: &str, fields: &ActivityFields, username: &str) -> bool {
    owner == username
        || fields.staff_in_charge == username
        || fields.planning_staff.iter().any(|u| u == username)
        || fields.accompanying_staff.iter().any(|u| u == username)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
