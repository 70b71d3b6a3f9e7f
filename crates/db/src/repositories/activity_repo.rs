//! Repository for the `activities`, `activity_students`, and
//! `activity_staff` tables.

use sqlx::{PgConnection, PgExecutor};
use excursions_core::activity::{ActivityFields, ActivityStatus};
use excursions_core::types::DbId;

use crate::models::activity::{
    Activity, ActivityListEntry, ActivityLists, LIST_ROLE_STUDENT, STAFF_ROLE_ACCOMPANYING,
    STAFF_ROLE_PLANNING,
};

/// Column list for `activities` queries.
const COLUMNS: &str = "\
    id, owner, activity_name, campus, activity_type, location, timestart, timeend, \
    staff_in_charge, cost, transport, details, permissions_type, permissions_limit, \
    permissions_due_by, status, deleted, absences_processed, roll_processed, \
    reminders_processed, version, created_at, updated_at";

/// Provides persistence for activities and their lists.
pub struct ActivityRepo;

impl ActivityRepo {
    /// Insert a new activity and its lists, returning the created row.
    pub async fn create(
        conn: &mut PgConnection,
        owner: &str,
        fields: &ActivityFields,
        status: ActivityStatus,
    ) -> Result<Activity, sqlx::Error> {
        let query = format!(
            "INSERT INTO activities \
                (owner, activity_name, campus, activity_type, location, timestart, timeend, \
                 staff_in_charge, cost, transport, details, permissions_type, \
                 permissions_limit, permissions_due_by, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );
        let activity = sqlx::query_as::<_, Activity>(&query)
            .bind(owner)
            .bind(&fields.activity_name)
            .bind(fields.campus.as_str())
            .bind(&fields.activity_type)
            .bind(&fields.location)
            .bind(fields.timestart)
            .bind(fields.timeend)
            .bind(&fields.staff_in_charge)
            .bind(fields.cost)
            .bind(&fields.transport)
            .bind(&fields.details)
            .bind(fields.permissions_type.as_str())
            .bind(fields.permissions_limit)
            .bind(fields.permissions_due_by)
            .bind(status.as_i16())
            .fetch_one(&mut *conn)
            .await?;

        Self::replace_lists(conn, activity.id, fields).await?;
        Ok(activity)
    }

    /// Find a non-deleted activity by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Activity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM activities WHERE id = $1 AND deleted = FALSE");
        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lock a non-deleted activity row for the rest of the transaction.
    ///
    /// Every workflow mutation takes this lock first so that concurrent
    /// approvals and edits of one activity are applied one at a time.
    pub async fn lock_for_update<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<Activity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM activities WHERE id = $1 AND deleted = FALSE FOR UPDATE"
        );
        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Overwrite the editable fields and status.
    ///
    /// When `expected_version` is given the update only applies if the row
    /// still has that version; `None` is returned on a mismatch. Processing
    /// flags are cleared when `reset_flags` is set.
    pub async fn update_fields(
        conn: &mut PgConnection,
        id: DbId,
        fields: &ActivityFields,
        status: ActivityStatus,
        expected_version: Option<i32>,
        reset_flags: bool,
    ) -> Result<Option<Activity>, sqlx::Error> {
        let query = format!(
            "UPDATE activities SET \
                activity_name = $2, campus = $3, activity_type = $4, location = $5, \
                timestart = $6, timeend = $7, staff_in_charge = $8, cost = $9, \
                transport = $10, details = $11, permissions_type = $12, \
                permissions_limit = $13, permissions_due_by = $14, status = $15, \
                absences_processed = absences_processed AND NOT $16, \
                roll_processed = roll_processed AND NOT $16, \
                reminders_processed = reminders_processed AND NOT $16, \
                version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE \
               AND ($17::INTEGER IS NULL OR version = $17) \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .bind(&fields.activity_name)
            .bind(fields.campus.as_str())
            .bind(&fields.activity_type)
            .bind(&fields.location)
            .bind(fields.timestart)
            .bind(fields.timeend)
            .bind(&fields.staff_in_charge)
            .bind(fields.cost)
            .bind(&fields.transport)
            .bind(&fields.details)
            .bind(fields.permissions_type.as_str())
            .bind(fields.permissions_limit)
            .bind(fields.permissions_due_by)
            .bind(status.as_i16())
            .bind(reset_flags)
            .bind(expected_version)
            .fetch_optional(&mut *conn)
            .await?;

        if updated.is_some() {
            Self::replace_lists(conn, id, fields).await?;
        }
        Ok(updated)
    }

    /// Set the status and bump the version.
    pub async fn update_status<'e, E>(
        executor: E,
        id: DbId,
        status: ActivityStatus,
    ) -> Result<Option<Activity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE activities SET status = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .bind(status.as_i16())
            .fetch_optional(executor)
            .await
    }

    /// Soft-delete an activity. Returns `true` if a row was marked.
    pub async fn soft_delete<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE activities SET deleted = TRUE, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Permanently remove an activity and everything hanging off it.
    pub async fn hard_delete<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load the student and staff lists of an activity, sorted by username.
    pub async fn load_lists<'e, E>(executor: E, id: DbId) -> Result<ActivityLists, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let entries = sqlx::query_as::<_, ActivityListEntry>(
            "SELECT username, $2::TEXT AS role FROM activity_students WHERE activity_id = $1 \
             UNION ALL \
             SELECT username, role FROM activity_staff WHERE activity_id = $1 \
             ORDER BY username",
        )
        .bind(id)
        .bind(LIST_ROLE_STUDENT)
        .fetch_all(executor)
        .await?;
        Ok(ActivityLists::from_entries(entries))
    }

    /// Replace the student and staff lists with those in `fields`.
    pub async fn replace_lists(
        conn: &mut PgConnection,
        id: DbId,
        fields: &ActivityFields,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM activity_students WHERE activity_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM activity_staff WHERE activity_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO activity_students (activity_id, username) \
             SELECT $1, u FROM UNNEST($2::TEXT[]) AS u \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&fields.students)
        .execute(&mut *conn)
        .await?;

        for (role, usernames) in [
            (STAFF_ROLE_ACCOMPANYING, &fields.accompanying_staff),
            (STAFF_ROLE_PLANNING, &fields.planning_staff),
        ] {
            sqlx::query(
                "INSERT INTO activity_staff (activity_id, username, role) \
                 SELECT $1, u, $3 FROM UNNEST($2::TEXT[]) AS u \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(usernames)
            .bind(role)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Activities in a given status, oldest start first.
    pub async fn list_by_status<'e, E>(
        executor: E,
        status: ActivityStatus,
    ) -> Result<Vec<Activity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM activities \
             WHERE status = $1 AND deleted = FALSE \
             ORDER BY timestart ASC, id ASC"
        );
        sqlx::query_as::<_, Activity>(&query)
            .bind(status.as_i16())
            .fetch_all(executor)
            .await
    }

    /// Activities a user created, leads, plans, or accompanies.
    ///
    /// Autosaves are only visible to their owner.
    pub async fn list_for_user<'e, E>(
        executor: E,
        username: &str,
    ) -> Result<Vec<Activity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM activities a \
             WHERE a.deleted = FALSE \
               AND (a.owner = $1 \
                    OR (a.status <> $2 AND (a.staff_in_charge = $1 \
                        OR EXISTS (SELECT 1 FROM activity_staff s \
                                   WHERE s.activity_id = a.id AND s.username = $1)))) \
             ORDER BY a.timestart DESC, a.id DESC"
        );
        sqlx::query_as::<_, Activity>(&query)
            .bind(username)
            .bind(ActivityStatus::Autosave.as_i16())
            .fetch_all(executor)
            .await
    }
}
