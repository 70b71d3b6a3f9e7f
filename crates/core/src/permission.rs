//! Parent permission settings, responses, and attendance.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

pub const PERMISSION_KIND_NONE: &str = "none";
pub const PERMISSION_KIND_SYSTEM: &str = "system";

/// All valid permission kinds.
pub const VALID_PERMISSION_KINDS: &[&str] = &[PERMISSION_KIND_NONE, PERMISSION_KIND_SYSTEM];

/// Whether parent permission is collected for an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// No permission needed; every listed student attends.
    None,
    /// Parents respond through the system.
    System,
}

impl PermissionKind {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            PERMISSION_KIND_NONE => Ok(Self::None),
            PERMISSION_KIND_SYSTEM => Ok(Self::System),
            _ => Err(CoreError::Validation(format!(
                "Invalid permissions type '{s}'. Must be one of: {}",
                VALID_PERMISSION_KINDS.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => PERMISSION_KIND_NONE,
            Self::System => PERMISSION_KIND_SYSTEM,
        }
    }
}

/// A parent's answer. Discriminants are the stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum PermissionResponse {
    Pending = 0,
    Yes = 1,
    No = 2,
}

impl PermissionResponse {
    pub fn from_i16(value: i16) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Yes),
            2 => Ok(Self::No),
            other => Err(CoreError::Validation(format!(
                "Unknown permission response {other}"
            ))),
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl From<PermissionResponse> for i16 {
    fn from(response: PermissionResponse) -> Self {
        response.as_i16()
    }
}

impl TryFrom<i16> for PermissionResponse {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_i16(value)
    }
}

/// Permission collection settings of one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionSettings {
    pub kind: PermissionKind,
    /// Maximum attending students; 0 means unlimited.
    pub limit: i32,
    pub due_by: Option<Timestamp>,
}

impl PermissionSettings {
    pub fn requires_permission(&self) -> bool {
        self.kind == PermissionKind::System
    }
}

/// One (student, parent) response, as loaded for attendance checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub student: String,
    pub parent: String,
    pub response: PermissionResponse,
}

/// Students that will attend.
///
/// Without required permission every listed student attends. Otherwise a
/// student attends with at least one YES and no NO from any parent.
pub fn attending_students(
    students: &[String],
    settings: &PermissionSettings,
    records: &[ResponseRecord],
) -> Vec<String> {
    if !settings.requires_permission() {
        return students.to_vec();
    }

    let mut by_student: BTreeMap<&str, (bool, bool)> = BTreeMap::new();
    for record in records {
        let entry = by_student.entry(record.student.as_str()).or_default();
        match record.response {
            PermissionResponse::Yes => entry.0 = true,
            PermissionResponse::No => entry.1 = true,
            PermissionResponse::Pending => {}
        }
    }

    students
        .iter()
        .filter(|s| matches!(by_student.get(s.as_str()), Some((true, false))))
        .cloned()
        .collect()
}

/// Check whether a parent response may be recorded now.
pub fn validate_response(
    settings: &PermissionSettings,
    now: Timestamp,
    student: &str,
    response: PermissionResponse,
    attending: &[String],
) -> Result<(), CoreError> {
    if !settings.requires_permission() {
        return Err(CoreError::Validation(
            "This activity does not collect permissions".to_string(),
        ));
    }
    if let Some(due_by) = settings.due_by {
        if now > due_by {
            return Err(CoreError::Validation(
                "The permission due date has passed".to_string(),
            ));
        }
    }
    let already_attending = attending.iter().any(|s| s == student);
    if response == PermissionResponse::Yes
        && settings.limit > 0
        && !already_attending
        && attending.len() >= settings.limit as usize
    {
        return Err(CoreError::Validation(format!(
            "The activity is full ({} places)",
            settings.limit
        )));
    }
    Ok(())
}

/// (student, parent) pairs that still need a pending row.
pub fn missing_permission_pairs(
    mentors: &[(String, String)],
    existing: &[ResponseRecord],
) -> Vec<(String, String)> {
    let present: BTreeSet<(&str, &str)> = existing
        .iter()
        .map(|r| (r.student.as_str(), r.parent.as_str()))
        .collect();
    let mut seen = BTreeSet::new();
    mentors
        .iter()
        .filter(|(s, p)| !present.contains(&(s.as_str(), p.as_str())))
        .filter(|pair| seen.insert((*pair).clone()))
        .cloned()
        .collect()
}
