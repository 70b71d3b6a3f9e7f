//! Repository for the `approval_steps` table.

use sqlx::{PgConnection, PgExecutor};
use excursions_core::approval::{ApprovalStatus, NewApprovalStep};
use excursions_core::types::DbId;

use crate::models::approval_step::ApprovalStepRow;

/// Column list for `approval_steps` queries.
const COLUMNS: &str = "\
    id, activity_id, step_type, sequence, description, status, skip, invalidated, \
    nominated, username, timecreated, timemodified";

/// Provides persistence for approval steps.
pub struct ApprovalStepRepo;

impl ApprovalStepRepo {
    /// Every step row of an activity, active and invalidated, in sequence order.
    pub async fn list_for_activity<'e, E>(
        executor: E,
        activity_id: DbId,
    ) -> Result<Vec<ApprovalStepRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM approval_steps \
             WHERE activity_id = $1 \
             ORDER BY sequence ASC, id ASC"
        );
        sqlx::query_as::<_, ApprovalStepRow>(&query)
            .bind(activity_id)
            .fetch_all(executor)
            .await
    }

    /// Active step rows of several activities.
    pub async fn list_active_for_activities<'e, E>(
        executor: E,
        activity_ids: &[DbId],
    ) -> Result<Vec<ApprovalStepRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM approval_steps \
             WHERE activity_id = ANY($1) AND invalidated = FALSE \
             ORDER BY activity_id ASC, sequence ASC, id ASC"
        );
        sqlx::query_as::<_, ApprovalStepRow>(&query)
            .bind(activity_ids)
            .fetch_all(executor)
            .await
    }

    /// Mark rows invalidated. Already-invalidated rows are left alone.
    pub async fn invalidate<'e, E>(executor: E, ids: &[DbId]) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE approval_steps SET invalidated = TRUE, timemodified = NOW() \
             WHERE id = ANY($1) AND invalidated = FALSE",
        )
        .bind(ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert fresh unapproved rows for an activity.
    pub async fn insert_many(
        conn: &mut PgConnection,
        activity_id: DbId,
        steps: &[NewApprovalStep],
    ) -> Result<Vec<ApprovalStepRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO approval_steps (activity_id, step_type, sequence, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let mut rows = Vec::with_capacity(steps.len());
        for step in steps {
            let row = sqlx::query_as::<_, ApprovalStepRow>(&query)
                .bind(activity_id)
                .bind(step.step_type.as_str())
                .bind(step.sequence)
                .bind(&step.description)
                .fetch_one(&mut *conn)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Record an approval decision on an active step.
    pub async fn set_status<'e, E>(
        executor: E,
        id: DbId,
        status: ApprovalStatus,
        username: &str,
    ) -> Result<Option<ApprovalStepRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE approval_steps SET status = $2, username = $3, timemodified = NOW() \
             WHERE id = $1 AND invalidated = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalStepRow>(&query)
            .bind(id)
            .bind(status.as_i16())
            .bind(username)
            .fetch_optional(executor)
            .await
    }

    /// Toggle the skip flag on an active step.
    pub async fn set_skip<'e, E>(
        executor: E,
        id: DbId,
        skip: bool,
        username: &str,
    ) -> Result<Option<ApprovalStepRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE approval_steps SET skip = $2, username = $3, timemodified = NOW() \
             WHERE id = $1 AND invalidated = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalStepRow>(&query)
            .bind(id)
            .bind(skip)
            .bind(username)
            .fetch_optional(executor)
            .await
    }

    /// Record the nominated approver of an active step.
    pub async fn set_nominated<'e, E>(
        executor: E,
        id: DbId,
        nominee: &str,
    ) -> Result<Option<ApprovalStepRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE approval_steps SET nominated = $2, timemodified = NOW() \
             WHERE id = $1 AND invalidated = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApprovalStepRow>(&query)
            .bind(id)
            .bind(nominee)
            .fetch_optional(executor)
            .await
    }
}
