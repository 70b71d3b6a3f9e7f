//! Calendar event rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use excursions_core::activity::ActivityFields;
use excursions_core::conflict::{EventKind, EventWindow};
use excursions_core::error::CoreError;
use excursions_core::event::{backing_event_areas, backing_event_type, validate_event};
use excursions_core::types::{DbId, Timestamp};

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalendarEvent {
    pub id: DbId,
    pub event_name: String,
    pub event_type: String,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
    pub owner: String,
    pub areas: Vec<String>,
    pub nonnegotiable: bool,
    pub nonnegotiable_reason: Option<String>,
    pub is_activity: bool,
    pub activity_id: Option<DbId>,
    pub sync_approved: bool,
    pub time_synced: Option<Timestamp>,
    pub deleted: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CalendarEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::for_event(self.is_activity)
    }

    pub fn window(&self) -> EventWindow {
        EventWindow {
            id: self.id,
            start: self.timestart,
            end: self.timeend,
            kind: self.kind(),
        }
    }
}

/// DTO for creating or updating a calendar event.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvent {
    pub event_name: String,
    pub event_type: String,
    pub timestart: Timestamp,
    pub timeend: Timestamp,
    #[serde(default)]
    pub areas: Vec<String>,
    #[serde(default)]
    pub nonnegotiable: bool,
    pub nonnegotiable_reason: Option<String>,
}

impl CreateEvent {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_event(
            &self.event_name,
            &self.event_type,
            self.timestart,
            self.timeend,
            self.nonnegotiable,
            self.nonnegotiable_reason.as_deref(),
        )
    }

    /// Calendar entry mirroring an activity.
    pub fn for_activity(fields: &ActivityFields) -> Self {
        Self {
            event_name: fields.activity_name.clone(),
            event_type: backing_event_type(fields).to_string(),
            timestart: fields.timestart,
            timeend: fields.timeend,
            areas: backing_event_areas(fields),
            nonnegotiable: false,
            nonnegotiable_reason: None,
        }
    }
}
