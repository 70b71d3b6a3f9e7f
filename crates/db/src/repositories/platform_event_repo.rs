//! Repository for the `platform_events` audit table.

use sqlx::PgExecutor;
use excursions_core::types::DbId;

use crate::models::platform_event::PlatformEventRow;

/// Column list for `platform_events` queries.
const COLUMNS: &str =
    "id, event_type, source_entity_type, source_entity_id, actor, payload, created_at";

/// Provides read/write operations for the audit trail.
pub struct PlatformEventRepo;

impl PlatformEventRepo {
    /// Insert an audit row, returning the generated ID.
    pub async fn insert<'e, E>(
        executor: E,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        actor: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "INSERT INTO platform_events \
                (event_type, source_entity_type, source_entity_id, actor, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(source_entity_type)
        .bind(source_entity_id)
        .bind(actor)
        .bind(payload)
        .fetch_one(executor)
        .await
    }

    /// Audit rows for one entity, newest first.
    pub async fn list_for_entity<'e, E>(
        executor: E,
        source_entity_type: &str,
        source_entity_id: DbId,
    ) -> Result<Vec<PlatformEventRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM platform_events \
             WHERE source_entity_type = $1 AND source_entity_id = $2 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, PlatformEventRow>(&query)
            .bind(source_entity_type)
            .bind(source_entity_id)
            .fetch_all(executor)
            .await
    }
}
