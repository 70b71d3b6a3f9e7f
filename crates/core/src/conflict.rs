//! Calendar conflict detection and reconciliation.
//!
//! Intervals are half-open: two events that only share a boundary instant
//! do not conflict.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Review state of a conflict pair. Discriminants are the stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum ConflictStatus {
    Flagged = 0,
    Ignored = 1,
}

impl ConflictStatus {
    pub fn from_i16(value: i16) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Flagged),
            1 => Ok(Self::Ignored),
            other => Err(CoreError::Validation(format!(
                "Unknown conflict status {other}"
            ))),
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl From<ConflictStatus> for i16 {
    fn from(status: ConflictStatus) -> Self {
        status.as_i16()
    }
}

impl TryFrom<i16> for ConflictStatus {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_i16(value)
    }
}

pub const EVENT_KIND_ACTIVITY: &str = "activity";
pub const EVENT_KIND_EVENT: &str = "event";

/// What the other side of a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Backing event of an excursion/incursion.
    Activity,
    /// Plain calendar event.
    Event,
}

impl EventKind {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            EVENT_KIND_ACTIVITY => Ok(Self::Activity),
            EVENT_KIND_EVENT => Ok(Self::Event),
            _ => Err(CoreError::Internal(format!("Unknown event kind '{s}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => EVENT_KIND_ACTIVITY,
            Self::Event => EVENT_KIND_EVENT,
        }
    }

    pub fn for_event(is_activity: bool) -> Self {
        if is_activity {
            Self::Activity
        } else {
            Self::Event
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Whether `[start, end)` and `[other_start, other_end)` intersect.
pub fn overlaps(start: Timestamp, end: Timestamp, other_start: Timestamp, other_end: Timestamp) -> bool {
    other_start < end && other_end > start
}

/// Time window of a candidate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWindow {
    pub id: DbId,
    pub start: Timestamp,
    pub end: Timestamp,
    pub kind: EventKind,
}

/// A detected overlap with another event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundConflict {
    pub other_id: DbId,
    pub other_kind: EventKind,
}

/// Candidates overlapping `[start, end)`, excluding `event_id` itself.
pub fn find_conflicts(
    event_id: DbId,
    start: Timestamp,
    end: Timestamp,
    candidates: &[EventWindow],
) -> Vec<FoundConflict> {
    candidates
        .iter()
        .filter(|c| c.id != event_id && overlaps(start, end, c.start, c.end))
        .map(|c| FoundConflict {
            other_id: c.id,
            other_kind: c.kind,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A persisted conflict pair involving the event being synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConflict {
    pub id: DbId,
    pub event_id1: DbId,
    pub event_id2: DbId,
    pub status: ConflictStatus,
}

impl StoredConflict {
    /// The side of the pair that is not `event_id`.
    pub fn other(&self, event_id: DbId) -> DbId {
        if self.event_id1 == event_id {
            self.event_id2
        } else {
            self.event_id1
        }
    }
}

/// Direction-independent key of a conflict pair.
pub fn pair_key(a: DbId, b: DbId) -> (DbId, DbId) {
    (a.min(b), a.max(b))
}

/// Row changes that bring stored conflicts in line with a fresh check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSync {
    /// Stored rows still overlapping; id and status untouched.
    pub retained: Vec<DbId>,
    /// Stored rows no longer overlapping.
    pub delete: Vec<DbId>,
    /// New pairs to insert flagged: `(other_id, other_kind)`.
    pub insert: Vec<FoundConflict>,
}

/// Reconcile `found` against `existing` rows for `event_id`.
///
/// Stored pairs that still overlap keep their row and status, so an ignored
/// conflict stays ignored across repeated checks.
pub fn reconcile(event_id: DbId, found: &[FoundConflict], existing: &[StoredConflict]) -> ConflictSync {
    let by_pair: BTreeMap<(DbId, DbId), &StoredConflict> = existing
        .iter()
        .map(|c| (pair_key(c.event_id1, c.event_id2), c))
        .collect();

    let mut sync = ConflictSync::default();
    let mut kept = BTreeSet::new();

    for conflict in found {
        let key = pair_key(event_id, conflict.other_id);
        if !kept.insert(key) {
            continue;
        }
        match by_pair.get(&key) {
            Some(stored) => sync.retained.push(stored.id),
            None => sync.insert.push(conflict.clone()),
        }
    }

    sync.delete = existing
        .iter()
        .filter(|c| !kept.contains(&pair_key(c.event_id1, c.event_id2)))
        .map(|c| c.id)
        .collect();

    sync
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(minutes: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn window(id: DbId, start: i64, end: i64) -> EventWindow {
        EventWindow {
            id,
            start: at(start),
            end: at(end),
            kind: EventKind::Event,
        }
    }

    #[test]
    fn shared_boundary_is_not_a_conflict() {
        assert!(!overlaps(at(0), at(60), at(60), at(120)));
        assert!(!overlaps(at(60), at(120), at(0), at(60)));
    }

    #[test]
    fn one_minute_overlap_is_a_conflict() {
        assert!(overlaps(at(0), at(61), at(60), at(120)));
    }

    #[test]
    fn containment_and_identity_conflict() {
        assert!(overlaps(at(0), at(120), at(30), at(60)));
        assert!(overlaps(at(30), at(60), at(0), at(120)));
        assert!(overlaps(at(0), at(60), at(0), at(60)));
    }

    #[test]
    fn detection_is_symmetric() {
        let events = vec![window(1, 0, 60), window(2, 30, 90), window(3, 90, 120)];
        for a in &events {
            for b in &events {
                if a.id == b.id {
                    continue;
                }
                let a_sees_b = find_conflicts(a.id, a.start, a.end, &events)
                    .iter()
                    .any(|c| c.other_id == b.id);
                let b_sees_a = find_conflicts(b.id, b.start, b.end, &events)
                    .iter()
                    .any(|c| c.other_id == a.id);
                assert_eq!(a_sees_b, b_sees_a, "events {} and {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn event_never_conflicts_with_itself() {
        let events = vec![window(1, 0, 60)];
        assert!(find_conflicts(1, at(0), at(60), &events).is_empty());
    }

    #[test]
    fn ignored_status_survives_resync() {
        let stored = vec![StoredConflict {
            id: 10,
            event_id1: 2,
            event_id2: 1,
            status: ConflictStatus::Ignored,
        }];
        let found = vec![FoundConflict {
            other_id: 2,
            other_kind: EventKind::Event,
        }];
        let sync = reconcile(1, &found, &stored);
        assert_eq!(sync.retained, vec![10]);
        assert!(sync.delete.is_empty());
        assert!(sync.insert.is_empty());
    }

    #[test]
    fn stale_pairs_are_deleted_and_new_ones_inserted() {
        let stored = vec![StoredConflict {
            id: 10,
            event_id1: 1,
            event_id2: 2,
            status: ConflictStatus::Flagged,
        }];
        let found = vec![FoundConflict {
            other_id: 3,
            other_kind: EventKind::Activity,
        }];
        let sync = reconcile(1, &found, &stored);
        assert_eq!(sync.delete, vec![10]);
        assert_eq!(sync.insert.len(), 1);
        assert_eq!(sync.insert[0].other_id, 3);
    }

    #[test]
    fn pair_key_ignores_direction() {
        assert_eq!(pair_key(5, 2), pair_key(2, 5));
        let stored = StoredConflict {
            id: 1,
            event_id1: 5,
            event_id2: 2,
            status: ConflictStatus::Flagged,
        };
        assert_eq!(stored.other(5), 2);
        assert_eq!(stored.other(2), 5);
    }
}
