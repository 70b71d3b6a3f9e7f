//! Repository for the `permissions` table.

use sqlx::PgExecutor;
use excursions_core::permission::PermissionResponse;
use excursions_core::types::DbId;

use crate::models::permission::Permission;

/// Column list for `permissions` queries.
const COLUMNS: &str = "id, activity_id, student, parent, response, created_at, updated_at";

/// Provides persistence for parent permission responses.
pub struct PermissionRepo;

impl PermissionRepo {
    /// Every permission row of an activity, ordered by student then parent.
    pub async fn list_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
    ) -> Result<Vec<Permission>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM permissions \
             WHERE activity_id = $1 \
             ORDER BY student ASC, parent ASC"
        );
        sqlx::query_as::<_, Permission>(&query)
            .bind(activity_id)
            .fetch_all(executor)
            .await
    }

    /// Insert pending rows for (student, parent) pairs, skipping any that exist.
    pub async fn insert_pending<'e, E>(
        executor: E,
        activity_id: DbId,
        students: &[String],
        parents: &[String],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO permissions (activity_id, student, parent, response) \
             SELECT $1, s, p, $4 FROM UNNEST($2::TEXT[], $3::TEXT[]) AS t(s, p) \
             ON CONFLICT (activity_id, student, parent) DO NOTHING",
        )
        .bind(activity_id)
        .bind(students)
        .bind(parents)
        .bind(PermissionResponse::Pending.as_i16())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record a parent's answer, returning the updated row.
    pub async fn set_response<'e, E>(
        executor: E,
        activity_id: DbId,
        student: &str,
        parent: &str,
        response: PermissionResponse,
    ) -> Result<Option<Permission>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE permissions SET response = $4, updated_at = NOW() \
             WHERE activity_id = $1 AND student = $2 AND parent = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Permission>(&query)
            .bind(activity_id)
            .bind(student)
            .bind(parent)
            .bind(response.as_i16())
            .fetch_optional(executor)
            .await
    }

    /// Remove rows for students no longer on the activity.
    pub async fn delete_students_not_in<'e, E>(
        executor: E,
        activity_id: DbId,
        students: &[String],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM permissions WHERE activity_id = $1 AND NOT (student = ANY($2))",
        )
        .bind(activity_id)
        .bind(students)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
