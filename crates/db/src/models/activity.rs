//! Activity rows and their staff/student lists.

use serde::Serialize;
use sqlx::FromRow;
use excursions_core::activity::{ActivityFields, ActivityStatus, Campus};
use excursions_core::error::CoreError;
use excursions_core::permission::{PermissionKind, PermissionSettings};
use excursions_core::types::{DbId, Timestamp};

pub const STAFF_ROLE_ACCOMPANYING: &str = "accompanying";
pub const STAFF_ROLE_PLANNING: &str = "planning";
/// Pseudo-role used when students and staff are read in one query.
pub const LIST_ROLE_STUDENT: &str = "student";

/// A row from the `activities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Activity {
    pub id: DbId,
    pub owner: String,
    pub activity_name: String,
    pub campus: String,
    pub activity_type: String,
    pub location: String,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
    pub staff_in_charge: String,
    pub cost: Option<f64>,
    pub transport: String,
    pub details: String,
    pub permissions_type: String,
    pub permissions_limit: i32,
    pub permissions_due_by: Option<Timestamp>,
    pub status: i16,
    pub deleted: bool,
    pub absences_processed: bool,
    pub roll_processed: bool,
    pub reminders_processed: bool,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Activity {
    pub fn status(&self) -> Result<ActivityStatus, CoreError> {
        ActivityStatus::from_i16(self.status)
    }

    pub fn campus(&self) -> Result<Campus, CoreError> {
        Campus::from_str_value(&self.campus)
    }

    pub fn permission_settings(&self) -> Result<PermissionSettings, CoreError> {
        Ok(PermissionSettings {
            kind: PermissionKind::from_str_value(&self.permissions_type)?,
            limit: self.permissions_limit,
            due_by: self.permissions_due_by,
        })
    }

    /// Snapshot of the editable fields, combining the row with its lists.
    pub fn fields(&self, lists: &ActivityLists) -> Result<ActivityFields, CoreError> {
        Ok(ActivityFields {
            activity_name: self.activity_name.clone(),
            campus: self.campus()?,
            activity_type: self.activity_type.clone(),
            location: self.location.clone(),
            timestart: self.timestart,
            timeend: self.timeend,
            students: lists.students.clone(),
            staff_in_charge: self.staff_in_charge.clone(),
            accompanying_staff: lists.accompanying_staff.clone(),
            planning_staff: lists.planning_staff.clone(),
            cost: self.cost,
            transport: self.transport.clone(),
            details: self.details.clone(),
            permissions_type: PermissionKind::from_str_value(&self.permissions_type)?,
            permissions_limit: self.permissions_limit,
            permissions_due_by: self.permissions_due_by,
        }
        .normalized())
    }
}

/// One username from `activity_students` or `activity_staff`.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityListEntry {
    pub username: String,
    pub role: String,
}

/// Student and staff usernames attached to an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityLists {
    pub students: Vec<String>,
    pub accompanying_staff: Vec<String>,
    pub planning_staff: Vec<String>,
}

impl ActivityLists {
    pub fn from_entries(entries: Vec<ActivityListEntry>) -> Self {
        let mut lists = Self::default();
        for entry in entries {
            match entry.role.as_str() {
                LIST_ROLE_STUDENT => lists.students.push(entry.username),
                STAFF_ROLE_ACCOMPANYING => lists.accompanying_staff.push(entry.username),
                STAFF_ROLE_PLANNING => lists.planning_staff.push(entry.username),
                _ => {}
            }
        }
        lists
    }
}

/// An activity row together with its lists, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(flatten)]
    pub lists: ActivityLists,
    /// Name of the first outstanding approval step.
    pub stage: Option<String>,
}
