//! Calendar events and conflict reconciliation.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sqlx::PgConnection;
use excursions_core::activity::validate_time_range;
use excursions_core::actor::Actor;
use excursions_core::conflict::{find_conflicts, reconcile, ConflictStatus, ConflictSync, EventWindow};
use excursions_core::error::CoreError;
use excursions_core::types::{DbId, Timestamp};
use excursions_db::models::conflict::{ConflictSummary, EventConflict};
use excursions_db::models::event::{CalendarEvent, CreateEvent};
use excursions_db::repositories::{ConflictRepo, EventRepo};
use excursions_db::DbPool;
use excursions_events::{AuditKind, EventBus, PlatformEvent};

use crate::error::WorkflowResult;

/// Ids are BIGSERIAL and start at 1, so this never matches a row.
const NO_EVENT: DbId = 0;

/// A calendar event with its current conflicts.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub conflicts: Vec<ConflictSummary>,
}

/// Re-check `event` against the calendar and bring its stored conflict rows
/// in line. Runs on the caller's transaction.
///
/// Pairs that still overlap keep their row and status. The pair index plus
/// `ON CONFLICT DO NOTHING` keeps concurrent checks of the same pair from
/// storing it twice.
pub(crate) async fn sync_event_conflicts(
    conn: &mut PgConnection,
    event: &CalendarEvent,
) -> WorkflowResult<ConflictSync> {
    let candidates =
        EventRepo::list_overlapping(&mut *conn, event.timestart, event.timeend, event.id).await?;
    let windows: Vec<EventWindow> = candidates.iter().map(CalendarEvent::window).collect();
    let found = find_conflicts(event.id, event.timestart, event.timeend, &windows);

    let existing = ConflictRepo::list_for_event(&mut *conn, event.id)
        .await?
        .iter()
        .map(EventConflict::to_stored)
        .collect::<Result<Vec<_>, _>>()?;

    let sync = reconcile(event.id, &found, &existing);
    ConflictRepo::delete_many(&mut *conn, &sync.delete).await?;
    for conflict in &sync.insert {
        ConflictRepo::insert(
            &mut *conn,
            event.id,
            event.kind(),
            conflict.other_id,
            conflict.other_kind,
        )
        .await?;
    }

    tracing::debug!(
        event_id = event.id,
        retained = sync.retained.len(),
        inserted = sync.insert.len(),
        deleted = sync.delete.len(),
        "Synced event conflicts"
    );
    Ok(sync)
}

/// Audit event describing a conflict sync.
pub(crate) fn conflicts_synced_event(event_id: DbId, actor: &Actor, sync: &ConflictSync) -> PlatformEvent {
    PlatformEvent::new(
        AuditKind::ConflictsSynced,
        event_id,
        actor.username.as_str(),
        json!({
            "retained": sync.retained.len(),
            "inserted": sync.insert.len(),
            "deleted": sync.delete.len(),
        }),
    )
}

fn ensure_event_owner(actor: &Actor, event: &CalendarEvent) -> Result<(), CoreError> {
    if event.is_activity {
        return Err(CoreError::Conflict(format!(
            "Event {} belongs to an activity; edit the activity instead",
            event.id
        )));
    }
    if event.owner != actor.username {
        return Err(CoreError::PermissionDenied(format!(
            "{} does not own event {}",
            actor.username, event.id
        )));
    }
    Ok(())
}

fn event_not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Event", id }
}

/// Calendar operations.
pub struct CalendarService {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl CalendarService {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Create a plain calendar event and record its conflicts.
    pub async fn create_event(&self, actor: &Actor, input: &CreateEvent) -> WorkflowResult<EventDetail> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let event = EventRepo::create(&mut *tx, &actor.username, input).await?;
        let sync = sync_event_conflicts(&mut tx, &event).await?;
        let conflicts = ConflictRepo::list_summaries(&mut *tx, event.id).await?;
        tx.commit().await?;

        tracing::info!(event_id = event.id, owner = %actor.username, "Event created");
        self.bus.publish(conflicts_synced_event(event.id, actor, &sync));
        Ok(EventDetail { event, conflicts })
    }

    /// Edit a plain calendar event. Only its owner may.
    pub async fn update_event(
        &self,
        actor: &Actor,
        event_id: DbId,
        input: &CreateEvent,
    ) -> WorkflowResult<EventDetail> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;
        let current = EventRepo::lock_for_update(&mut *tx, event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        ensure_event_owner(actor, &current)?;

        let event = EventRepo::update(&mut *tx, event_id, input)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        let sync = sync_event_conflicts(&mut tx, &event).await?;
        let conflicts = ConflictRepo::list_summaries(&mut *tx, event_id).await?;
        tx.commit().await?;

        tracing::info!(event_id, "Event updated");
        self.bus.publish(conflicts_synced_event(event_id, actor, &sync));
        Ok(EventDetail { event, conflicts })
    }

    /// Soft-delete a plain calendar event and drop its conflict rows.
    pub async fn delete_event(&self, actor: &Actor, event_id: DbId) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await?;
        let current = EventRepo::lock_for_update(&mut *tx, event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        ensure_event_owner(actor, &current)?;

        EventRepo::soft_delete(&mut *tx, event_id).await?;
        let removed = ConflictRepo::delete_for_event(&mut *tx, event_id).await?;
        tx.commit().await?;

        tracing::info!(event_id, conflicts_removed = removed, "Event deleted");
        Ok(())
    }

    pub async fn get_event(&self, event_id: DbId) -> WorkflowResult<EventDetail> {
        let event = EventRepo::find_by_id(&self.pool, event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        let conflicts = ConflictRepo::list_summaries(&self.pool, event_id).await?;
        Ok(EventDetail { event, conflicts })
    }

    pub async fn list_events(&self, from: Timestamp, to: Timestamp) -> WorkflowResult<Vec<CalendarEvent>> {
        validate_time_range(from, to)?;
        Ok(EventRepo::list_in_range(&self.pool, from, to).await?)
    }

    /// Events overlapping a proposed window, without recording anything.
    ///
    /// `event_id` excludes the event being edited from its own results.
    pub async fn check_conflicts(
        &self,
        event_id: Option<DbId>,
        start: Timestamp,
        end: Timestamp,
    ) -> WorkflowResult<Vec<CalendarEvent>> {
        validate_time_range(start, end)?;
        let exclude = event_id.unwrap_or(NO_EVENT);
        let candidates = EventRepo::list_overlapping(&self.pool, start, end, exclude).await?;
        let windows: Vec<EventWindow> = candidates.iter().map(CalendarEvent::window).collect();
        let found = find_conflicts(exclude, start, end, &windows);

        Ok(candidates
            .into_iter()
            .filter(|c| found.iter().any(|f| f.other_id == c.id))
            .collect())
    }

    /// Re-run conflict detection for a stored event and return its
    /// reconciled conflicts.
    pub async fn sync_conflicts(&self, actor: &Actor, event_id: DbId) -> WorkflowResult<Vec<ConflictSummary>> {
        let mut tx = self.pool.begin().await?;
        let event = EventRepo::lock_for_update(&mut *tx, event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        let sync = sync_event_conflicts(&mut tx, &event).await?;
        let conflicts = ConflictRepo::list_summaries(&mut *tx, event_id).await?;
        tx.commit().await?;

        self.bus.publish(conflicts_synced_event(event_id, actor, &sync));
        Ok(conflicts)
    }

    pub async fn list_conflicts(&self, event_id: DbId) -> WorkflowResult<Vec<ConflictSummary>> {
        EventRepo::find_by_id(&self.pool, event_id)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;
        Ok(ConflictRepo::list_summaries(&self.pool, event_id).await?)
    }

    /// Flag or ignore one conflict. Allowed for staff and for the owner of
    /// either event.
    pub async fn set_conflict_status(
        &self,
        actor: &Actor,
        conflict_id: DbId,
        status: ConflictStatus,
    ) -> WorkflowResult<EventConflict> {
        let conflict = ConflictRepo::find_by_id(&self.pool, conflict_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "EventConflict",
                id: conflict_id,
            })?;

        if !actor.is_staff {
            let mut owns_side = false;
            for id in [conflict.event_id1, conflict.event_id2] {
                if let Some(event) = EventRepo::find_by_id(&self.pool, id).await? {
                    owns_side |= event.owner == actor.username;
                }
            }
            if !owns_side {
                return Err(CoreError::PermissionDenied(format!(
                    "{} owns neither event of conflict {conflict_id}",
                    actor.username
                ))
                .into());
            }
        }

        let updated = ConflictRepo::set_status(&self.pool, conflict_id, status)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "EventConflict",
                id: conflict_id,
            })?;

        tracing::info!(conflict_id, status = status.as_i16(), actor = %actor.username, "Conflict status set");
        Ok(updated)
    }

    /// Set the sync-approved bit that releases an event to external
    /// calendars. Restricted to workflow approvers.
    pub async fn set_sync_approved(
        &self,
        actor: &Actor,
        event_id: DbId,
        approved: bool,
    ) -> WorkflowResult<CalendarEvent> {
        if !actor.is_approver() {
            return Err(CoreError::PermissionDenied(format!(
                "{} cannot approve events for sync",
                actor.username
            ))
            .into());
        }
        let event = EventRepo::set_sync_approved(&self.pool, event_id, approved)
            .await?
            .ok_or_else(|| event_not_found(event_id))?;

        tracing::info!(event_id, approved, "Event sync approval set");
        Ok(event)
    }
}
