//! Repository for the `events` table.

use sqlx::PgExecutor;
use excursions_core::types::{DbId, Timestamp};

use crate::models::event::{CalendarEvent, CreateEvent};

/// Column list for `events` queries.
const COLUMNS: &str = "\
    id, event_name, event_type, timestart, timeend, owner, areas, nonnegotiable, \
    nonnegotiable_reason, is_activity, activity_id, sync_approved, time_synced, \
    deleted, created_at, updated_at";

/// Provides persistence for calendar events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a plain calendar event.
    pub async fn create<'e, E>(
        executor: E,
        owner: &str,
        input: &CreateEvent,
    ) -> Result<CalendarEvent, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO events \
                (event_name, event_type, timestart, timeend, owner, areas, \
                 nonnegotiable, nonnegotiable_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(input.event_name.trim())
            .bind(&input.event_type)
            .bind(input.timestart)
            .bind(input.timeend)
            .bind(owner)
            .bind(&input.areas)
            .bind(input.nonnegotiable)
            .bind(&input.nonnegotiable_reason)
            .fetch_one(executor)
            .await
    }

    /// Overwrite the editable fields of a non-deleted event.
    pub async fn update<'e, E>(
        executor: E,
        id: DbId,
        input: &CreateEvent,
    ) -> Result<Option<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE events SET \
                event_name = $2, event_type = $3, timestart = $4, timeend = $5, \
                areas = $6, nonnegotiable = $7, nonnegotiable_reason = $8, \
                updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(id)
            .bind(input.event_name.trim())
            .bind(&input.event_type)
            .bind(input.timestart)
            .bind(input.timeend)
            .bind(&input.areas)
            .bind(input.nonnegotiable)
            .bind(&input.nonnegotiable_reason)
            .fetch_optional(executor)
            .await
    }

    /// Create or refresh the event backing an activity.
    pub async fn upsert_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
        owner: &str,
        input: &CreateEvent,
    ) -> Result<CalendarEvent, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO events \
                (event_name, event_type, timestart, timeend, owner, areas, is_activity, activity_id) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7) \
             ON CONFLICT (activity_id) DO UPDATE SET \
                event_name = EXCLUDED.event_name, event_type = EXCLUDED.event_type, \
                timestart = EXCLUDED.timestart, timeend = EXCLUDED.timeend, \
                owner = EXCLUDED.owner, areas = EXCLUDED.areas, \
                deleted = FALSE, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(input.event_name.trim())
            .bind(&input.event_type)
            .bind(input.timestart)
            .bind(input.timeend)
            .bind(owner)
            .bind(&input.areas)
            .bind(activity_id)
            .fetch_one(executor)
            .await
    }

    /// Find a non-deleted event by ID.
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM events WHERE id = $1 AND deleted = FALSE");
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lock a non-deleted event row for the rest of the transaction.
    pub async fn lock_for_update<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM events WHERE id = $1 AND deleted = FALSE FOR UPDATE"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The event backing an activity, if one exists.
    pub async fn find_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
    ) -> Result<Option<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM events WHERE activity_id = $1 AND deleted = FALSE"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(activity_id)
            .fetch_optional(executor)
            .await
    }

    /// Non-deleted events whose range intersects `[start, end)`, excluding
    /// `exclude_id`.
    pub async fn list_overlapping<'e, E>(
        executor: E,
        start: Timestamp,
        end: Timestamp,
        exclude_id: DbId,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE deleted = FALSE AND id <> $3 AND timestart < $2 AND timeend > $1 \
             ORDER BY timestart ASC, id ASC"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(start)
            .bind(end)
            .bind(exclude_id)
            .fetch_all(executor)
            .await
    }

    /// Non-deleted events intersecting a window, for calendar listings.
    pub async fn list_in_range<'e, E>(
        executor: E,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE deleted = FALSE AND timestart < $2 AND timeend > $1 \
             ORDER BY timestart ASC, id ASC"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(executor)
            .await
    }

    /// Soft-delete an event. Returns `true` if a row was marked.
    pub async fn soft_delete<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE events SET deleted = TRUE, updated_at = NOW() WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete the event backing an activity, returning its ID.
    pub async fn soft_delete_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "UPDATE events SET deleted = TRUE, updated_at = NOW() \
             WHERE activity_id = $1 AND deleted = FALSE \
             RETURNING id",
        )
        .bind(activity_id)
        .fetch_optional(executor)
        .await
    }

    /// Set the sync-approved bit of an event.
    pub async fn set_sync_approved<'e, E>(
        executor: E,
        id: DbId,
        approved: bool,
    ) -> Result<Option<CalendarEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE events SET sync_approved = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalendarEvent>(&query)
            .bind(id)
            .bind(approved)
            .fetch_optional(executor)
            .await
    }
}
