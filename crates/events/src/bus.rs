//! Audit events and the in-process bus that carries them.
//!
//! Workflow services publish a [`PlatformEvent`] after each committed
//! change. Subscribers (the audit writer, and anything else that wants to
//! react) each get their own copy through a `tokio::sync::broadcast`
//! channel.

use chrono::{DateTime, Utc};
use excursions_core::types::DbId;
use serde::Serialize;
use tokio::sync::broadcast;

/// What happened. The serialized form is the `event_type` column of
/// `platform_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    #[serde(rename = "activity.status_changed")]
    ActivityStatusChanged,
    #[serde(rename = "activity.step_approved")]
    StepApproved,
    #[serde(rename = "activity.step_skipped")]
    StepSkipped,
    #[serde(rename = "activity.approver_nominated")]
    ApproverNominated,
    #[serde(rename = "activity.deleted")]
    ActivityDeleted,
    #[serde(rename = "event.conflicts_synced")]
    ConflictsSynced,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActivityStatusChanged => "activity.status_changed",
            Self::StepApproved => "activity.step_approved",
            Self::StepSkipped => "activity.step_skipped",
            Self::ApproverNominated => "activity.approver_nominated",
            Self::ActivityDeleted => "activity.deleted",
            Self::ConflictsSynced => "event.conflicts_synced",
        }
    }

    /// Kind of row `entity_id` refers to: an activity or a calendar event.
    pub fn entity_type(&self) -> &'static str {
        match self {
            Self::ConflictsSynced => "event",
            _ => "activity",
        }
    }
}

/// One audited change, made by `actor` to the entity `entity_id`.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformEvent {
    pub kind: AuditKind,
    pub entity_id: DbId,
    pub actor: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(
        kind: AuditKind,
        entity_id: DbId,
        actor: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            entity_id,
            actor: actor.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Events buffered per subscriber before the slowest one starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fan out to current subscribers. Dropped silently when nobody listens.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
