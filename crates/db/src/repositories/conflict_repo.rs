//! Repository for the `event_conflicts` table.

use sqlx::PgExecutor;
use excursions_core::conflict::{ConflictStatus, EventKind};
use excursions_core::types::DbId;

use crate::models::conflict::{ConflictSummary, EventConflict};

/// Column list for `event_conflicts` queries.
const COLUMNS: &str =
    "id, event_id1, event_id2, event1_kind, event2_kind, status, created_at, updated_at";

/// Provides persistence for conflict pairs.
pub struct ConflictRepo;

impl ConflictRepo {
    /// Every stored pair involving an event, on either side.
    pub async fn list_for_event<'e, E>(
        executor: E,
        event_id: DbId,
    ) -> Result<Vec<EventConflict>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM event_conflicts \
             WHERE event_id1 = $1 OR event_id2 = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, EventConflict>(&query)
            .bind(event_id)
            .fetch_all(executor)
            .await
    }

    /// Find a conflict pair by ID.
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<EventConflict>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM event_conflicts WHERE id = $1");
        sqlx::query_as::<_, EventConflict>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Insert a flagged pair. A pair already stored in either direction is
    /// left untouched; returns `true` if a row was inserted.
    pub async fn insert<'e, E>(
        executor: E,
        event_id1: DbId,
        event1_kind: EventKind,
        event_id2: DbId,
        event2_kind: EventKind,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO event_conflicts (event_id1, event_id2, event1_kind, event2_kind, status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT DO NOTHING",
        )
        .bind(event_id1)
        .bind(event_id2)
        .bind(event1_kind.as_str())
        .bind(event2_kind.as_str())
        .bind(ConflictStatus::Flagged.as_i16())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete pairs by ID.
    pub async fn delete_many<'e, E>(executor: E, ids: &[DbId]) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM event_conflicts WHERE id = ANY($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every pair involving an event.
    pub async fn delete_for_event<'e, E>(executor: E, event_id: DbId) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM event_conflicts WHERE event_id1 = $1 OR event_id2 = $1")
                .bind(event_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    /// Change the status of one pair.
    pub async fn set_status<'e, E>(
        executor: E,
        id: DbId,
        status: ConflictStatus,
    ) -> Result<Option<EventConflict>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE event_conflicts SET status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventConflict>(&query)
            .bind(id)
            .bind(status.as_i16())
            .fetch_optional(executor)
            .await
    }

    /// Conflicts of an event with a summary of the other side.
    pub async fn list_summaries<'e, E>(
        executor: E,
        event_id: DbId,
    ) -> Result<Vec<ConflictSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ConflictSummary>(
            "SELECT c.id AS conflict_id, c.status, \
                    o.id AS other_event_id, \
                    CASE WHEN c.event_id1 = $1 THEN c.event2_kind ELSE c.event1_kind END AS other_kind, \
                    o.event_name AS other_event_name, o.owner AS other_owner, \
                    o.timestart AS other_timestart, o.timeend AS other_timeend, \
                    o.activity_id AS other_activity_id \
             FROM event_conflicts c \
             JOIN events o \
               ON o.id = CASE WHEN c.event_id1 = $1 THEN c.event_id2 ELSE c.event_id1 END \
             WHERE (c.event_id1 = $1 OR c.event_id2 = $1) AND o.deleted = FALSE \
             ORDER BY o.timestart ASC, c.id ASC",
        )
        .bind(event_id)
        .fetch_all(executor)
        .await
    }
}
