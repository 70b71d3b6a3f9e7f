//! Calendar event constants and input validation.

use crate::activity::{validate_time_range, ActivityFields, Campus};
use crate::error::CoreError;
use crate::types::Timestamp;

pub const EVENT_TYPE_ON_CAMPUS: &str = "on_campus";
pub const EVENT_TYPE_OFF_CAMPUS: &str = "off_campus";

/// All valid event type values.
pub const VALID_EVENT_TYPES: &[&str] = &[EVENT_TYPE_ON_CAMPUS, EVENT_TYPE_OFF_CAMPUS];

/// Maximum length of an event name.
pub const MAX_EVENT_NAME_LENGTH: usize = 255;

/// Validate the editable fields of a calendar event.
pub fn validate_event(
    name: &str,
    event_type: &str,
    start: Timestamp,
    end: Timestamp,
    nonnegotiable: bool,
    nonnegotiable_reason: Option<&str>,
) -> Result<(), CoreError> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_EVENT_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Event name must be between 1 and {MAX_EVENT_NAME_LENGTH} characters"
        )));
    }
    if !VALID_EVENT_TYPES.contains(&event_type) {
        return Err(CoreError::Validation(format!(
            "Invalid event type '{event_type}'. Must be one of: {}",
            VALID_EVENT_TYPES.join(", ")
        )));
    }
    validate_time_range(start, end)?;
    if nonnegotiable && nonnegotiable_reason.map_or(true, |r| r.trim().is_empty()) {
        return Err(CoreError::Validation(
            "A non-negotiable event needs a reason".to_string(),
        ));
    }
    Ok(())
}

/// Event type of the calendar entry backing an activity. Excursions leave
/// campus; incursions happen on it.
pub fn backing_event_type(fields: &ActivityFields) -> &'static str {
    if fields.activity_type == crate::activity::ACTIVITY_TYPE_INCURSION {
        EVENT_TYPE_ON_CAMPUS
    } else {
        EVENT_TYPE_OFF_CAMPUS
    }
}

/// Calendar areas of the event backing an activity.
pub fn backing_event_areas(fields: &ActivityFields) -> Vec<String> {
    match fields.campus {
        Campus::Primary => vec!["Primary School".to_string()],
        Campus::Senior => vec!["Senior School".to_string()],
    }
}
