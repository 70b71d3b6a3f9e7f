//! Parent permission collection and attendance.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use excursions_core::activity::{ensure_editable, is_activity_staff, ActivityFields};
use excursions_core::actor::Actor;
use excursions_core::error::CoreError;
use excursions_core::permission::{
    attending_students, missing_permission_pairs, validate_response, PermissionResponse,
    PermissionSettings, ResponseRecord,
};
use excursions_core::types::DbId;
use excursions_core::workflow::WorkflowDefinition;
use excursions_db::models::activity::Activity;
use excursions_db::models::permission::{MentorPair, Permission};
use excursions_db::repositories::{ActivityRepo, PermissionRepo};
use excursions_db::DbPool;

use crate::activity::lock_activity;
use crate::error::WorkflowResult;

/// Every permission row of an activity with the resulting attendance.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionOverview {
    pub permissions: Vec<Permission>,
    pub attending: Vec<String>,
}

fn to_records(rows: &[Permission]) -> Result<Vec<ResponseRecord>, CoreError> {
    rows.iter().map(Permission::to_record).collect()
}

/// Permission operations.
pub struct PermissionService {
    pool: DbPool,
    definition: Arc<WorkflowDefinition>,
}

impl PermissionService {
    pub fn new(pool: DbPool, definition: Arc<WorkflowDefinition>) -> Self {
        Self { pool, definition }
    }

    async fn load(&self, activity_id: DbId) -> WorkflowResult<(Activity, ActivityFields)> {
        let activity = ActivityRepo::find_by_id(&self.pool, activity_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Activity",
                id: activity_id,
            })?;
        let lists = ActivityRepo::load_lists(&self.pool, activity_id).await?;
        let fields = activity.fields(&lists)?;
        Ok((activity, fields))
    }

    /// Create a pending row for each (student, parent) pair that has none,
    /// and drop rows of students no longer on the activity.
    pub async fn initialise_permissions(
        &self,
        actor: &Actor,
        activity_id: DbId,
        mentors: &[MentorPair],
    ) -> WorkflowResult<Vec<Permission>> {
        let mut tx = self.pool.begin().await?;
        let (activity, fields) = lock_activity(&mut tx, activity_id).await?;
        ensure_editable(activity_id, activity.status()?)?;
        if !actor.can_edit(&self.definition, &activity.owner, &fields) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not manage permissions for activity {activity_id}",
                actor.username
            ))
            .into());
        }
        if !activity.permission_settings()?.requires_permission() {
            return Err(CoreError::Validation(
                "This activity does not collect permissions".to_string(),
            )
            .into());
        }
        if let Some(stray) = mentors.iter().find(|m| !fields.students.contains(&m.student)) {
            return Err(CoreError::Validation(format!(
                "{} is not a student on this activity",
                stray.student
            ))
            .into());
        }

        let removed =
            PermissionRepo::delete_students_not_in(&mut *tx, activity_id, &fields.students).await?;
        let existing = PermissionRepo::list_for_activity(&mut *tx, activity_id).await?;
        let pairs: Vec<(String, String)> = mentors
            .iter()
            .map(|m| (m.student.clone(), m.parent.clone()))
            .collect();
        let missing = missing_permission_pairs(&pairs, &to_records(&existing)?);
        let (students, parents): (Vec<String>, Vec<String>) = missing.into_iter().unzip();
        let inserted = PermissionRepo::insert_pending(&mut *tx, activity_id, &students, &parents).await?;

        let permissions = PermissionRepo::list_for_activity(&mut *tx, activity_id).await?;
        tx.commit().await?;

        tracing::info!(activity_id, inserted, removed, "Permissions initialised");
        Ok(permissions)
    }

    /// Record the acting parent's answer for one student.
    ///
    /// The activity row is locked so that two parents answering at once
    /// cannot both take the last place.
    pub async fn record_response(
        &self,
        actor: &Actor,
        activity_id: DbId,
        student: &str,
        response: PermissionResponse,
    ) -> WorkflowResult<Permission> {
        let mut tx = self.pool.begin().await?;
        let (activity, fields) = lock_activity(&mut tx, activity_id).await?;
        ensure_editable(activity_id, activity.status()?)?;
        let settings = activity.permission_settings()?;

        let existing = PermissionRepo::list_for_activity(&mut *tx, activity_id).await?;
        if !existing
            .iter()
            .any(|p| p.student == student && p.parent == actor.username)
        {
            tracing::warn!(activity_id, student, parent = %actor.username, "Response denied");
            return Err(not_a_parent(actor, activity_id, student).into());
        }
        let attending = attending_students(&fields.students, &settings, &to_records(&existing)?);
        validate_response(&settings, Utc::now(), student, response, &attending)?;

        let permission = PermissionRepo::set_response(
            &mut *tx,
            activity_id,
            student,
            &actor.username,
            response,
        )
        .await?
        .ok_or_else(|| not_a_parent(actor, activity_id, student))?;
        tx.commit().await?;

        tracing::info!(
            activity_id,
            student,
            parent = %actor.username,
            response = response.as_i16(),
            "Permission response recorded"
        );
        Ok(permission)
    }

    /// Students who will attend.
    pub async fn get_all_attending(&self, activity_id: DbId) -> WorkflowResult<Vec<String>> {
        let (activity, fields) = self.load(activity_id).await?;
        let settings: PermissionSettings = activity.permission_settings()?;
        let rows = PermissionRepo::list_for_activity(&self.pool, activity_id).await?;
        Ok(attending_students(&fields.students, &settings, &to_records(&rows)?))
    }

    /// Permission rows and attendance, for staff and the activity's people.
    pub async fn list(&self, actor: &Actor, activity_id: DbId) -> WorkflowResult<PermissionOverview> {
        let (activity, fields) = self.load(activity_id).await?;
        if !actor.is_staff && !is_activity_staff(&activity.owner, &fields, &actor.username) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not view permissions for activity {activity_id}",
                actor.username
            ))
            .into());
        }

        let settings = activity.permission_settings()?;
        let permissions = PermissionRepo::list_for_activity(&self.pool, activity_id).await?;
        let attending = attending_students(&fields.students, &settings, &to_records(&permissions)?);
        Ok(PermissionOverview {
            permissions,
            attending,
        })
    }
}

fn not_a_parent(actor: &Actor, activity_id: DbId, student: &str) -> CoreError {
    CoreError::PermissionDenied(format!(
        "{} is not a parent of {student} on activity {activity_id}",
        actor.username
    ))
}
