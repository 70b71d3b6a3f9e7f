//! Transactional activity lifecycle.
//!
//! Every mutation follows the same shape: lock the activity row, load its
//! steps, ask `excursions-core` for a plan, persist the plan and any queued
//! notifications, commit, then publish audit events on the bus. The row lock
//! serialises concurrent approvals and edits of one activity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgExecutor};
use excursions_core::activity::{
    changed_fields, deletion_mode, derive_status, ensure_can_cancel, ensure_can_submit,
    ensure_editable, is_activity_staff, resets_processing_flags, status_after_save,
    ActivityFields, ActivityInput, ActivityStatus, DeleteMode,
};
use excursions_core::actor::Actor;
use excursions_core::approval::{
    authorize_approval, authorize_nomination, authorize_skip, current_stage, generate_approvals,
    next_step, step_views, unactioned_steps, ApprovalPlan, ApprovalStatus, ApprovalStep, StepView,
};
use excursions_core::conflict::ConflictSync;
use excursions_core::error::CoreError;
use excursions_core::notification::{
    plan_cancellation_notifications, plan_nomination_notifications,
    plan_transition_notifications, Notification, TransitionContext,
};
use excursions_core::types::DbId;
use excursions_core::workflow::WorkflowDefinition;
use excursions_db::models::activity::{Activity, ActivityDetail, ActivityLists};
use excursions_db::models::approval_step::into_steps;
use excursions_db::models::event::CreateEvent;
use excursions_db::repositories::{
    ActivityRepo, ApprovalStepRepo, ConflictRepo, EventRepo, OutboxRepo,
};
use excursions_db::DbPool;
use excursions_events::{AuditKind, EventBus, PlatformEvent};

use crate::calendar::{conflicts_synced_event, sync_event_conflicts};
use crate::error::WorkflowResult;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// An activity with its steps, annotated for the viewing user.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub detail: ActivityDetail,
    pub steps: Vec<StepView>,
    pub can_edit: bool,
    pub can_delete: bool,
}

/// A list entry for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    #[serde(flatten)]
    pub activity: Activity,
    pub stage: Option<String>,
}

/// Result of acting on a single approval step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: ApprovalStep,
    pub status: ActivityStatus,
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum StepAction {
    Approve(bool),
    Skip(bool),
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn activity_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Activity",
        id,
    }
}

fn lists_of(fields: &ActivityFields) -> ActivityLists {
    ActivityLists {
        students: fields.students.clone(),
        accompanying_staff: fields.accompanying_staff.clone(),
        planning_staff: fields.planning_staff.clone(),
    }
}

fn detail(activity: Activity, fields: &ActivityFields, steps: &[ApprovalStep]) -> ActivityDetail {
    ActivityDetail {
        activity,
        lists: lists_of(fields),
        stage: current_stage(steps).map(str::to_string),
    }
}

fn status_changed_event(
    activity_id: DbId,
    actor: &Actor,
    from: ActivityStatus,
    to: ActivityStatus,
) -> PlatformEvent {
    PlatformEvent::new(
        AuditKind::ActivityStatusChanged,
        activity_id,
        actor.username.as_str(),
        json!({ "from": from.as_i16(), "to": to.as_i16() }),
    )
}

/// Lock an activity row and read its editable fields.
pub(crate) async fn lock_activity(
    conn: &mut PgConnection,
    id: DbId,
) -> WorkflowResult<(Activity, ActivityFields)> {
    let activity = ActivityRepo::lock_for_update(&mut *conn, id)
        .await?
        .ok_or_else(|| activity_not_found(id))?;
    let lists = ActivityRepo::load_lists(&mut *conn, id).await?;
    let fields = activity.fields(&lists)?;
    Ok((activity, fields))
}

async fn load_steps<'e, E>(executor: E, activity_id: DbId) -> WorkflowResult<Vec<ApprovalStep>>
where
    E: PgExecutor<'e>,
{
    let rows = ApprovalStepRepo::list_for_activity(executor, activity_id).await?;
    Ok(into_steps(rows)?)
}

/// Active steps for many activities, grouped by activity id.
async fn steps_by_activity(
    pool: &DbPool,
    activity_ids: &[DbId],
) -> WorkflowResult<BTreeMap<DbId, Vec<ApprovalStep>>> {
    let rows = ApprovalStepRepo::list_active_for_activities(pool, activity_ids).await?;
    let mut grouped: BTreeMap<DbId, Vec<ApprovalStep>> = BTreeMap::new();
    for step in into_steps(rows)? {
        grouped.entry(step.activity_id).or_default().push(step);
    }
    Ok(grouped)
}

async fn apply_plan(
    conn: &mut PgConnection,
    activity_id: DbId,
    plan: &ApprovalPlan,
) -> Result<(), sqlx::Error> {
    ApprovalStepRepo::invalidate(&mut *conn, &plan.invalidate).await?;
    if !plan.insert.is_empty() {
        ApprovalStepRepo::insert_many(&mut *conn, activity_id, &plan.insert).await?;
    }
    if !plan.is_empty() {
        tracing::debug!(
            activity_id,
            invalidated = plan.invalidate.len(),
            inserted = plan.insert.len(),
            "Applied approval plan"
        );
    }
    Ok(())
}

/// Recompute the status from the stored steps and persist it if it moved.
///
/// `target` is the status the caller would leave the activity in; inside
/// the workflow it is replaced by whatever the outstanding steps dictate.
async fn settle_status(
    conn: &mut PgConnection,
    activity: Activity,
    target: ActivityStatus,
) -> WorkflowResult<(Activity, ActivityStatus, Vec<ApprovalStep>)> {
    let steps = load_steps(&mut *conn, activity.id).await?;
    let derived = derive_status(target, !unactioned_steps(&steps).is_empty());
    if derived == activity.status()? {
        return Ok((activity, derived, steps));
    }
    let id = activity.id;
    let updated = ActivityRepo::update_status(&mut *conn, id, derived)
        .await?
        .ok_or_else(|| activity_not_found(id))?;
    Ok((updated, derived, steps))
}

async fn enqueue(
    conn: &mut PgConnection,
    activity_id: DbId,
    notifications: &[Notification],
) -> Result<(), sqlx::Error> {
    if notifications.is_empty() {
        return Ok(());
    }
    let queued = OutboxRepo::enqueue(conn, Some(activity_id), notifications).await?;
    tracing::debug!(activity_id, queued, "Queued notifications");
    Ok(())
}

/// Upsert the calendar entry mirroring an activity and sync its conflicts.
async fn sync_backing_event(
    conn: &mut PgConnection,
    activity: &Activity,
    fields: &ActivityFields,
) -> WorkflowResult<(DbId, ConflictSync)> {
    let input = CreateEvent::for_activity(fields);
    let event =
        EventRepo::upsert_for_activity(&mut *conn, activity.id, &activity.owner, &input).await?;
    let sync = sync_event_conflicts(conn, &event).await?;
    Ok((event.id, sync))
}

/// Remove the calendar entry of an activity and its conflict rows.
async fn retire_backing_event(conn: &mut PgConnection, activity_id: DbId) -> Result<(), sqlx::Error> {
    if let Some(event_id) = EventRepo::soft_delete_for_activity(&mut *conn, activity_id).await? {
        let removed = ConflictRepo::delete_for_event(&mut *conn, event_id).await?;
        tracing::debug!(activity_id, event_id, conflicts_removed = removed, "Retired backing event");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ActivityWorkflow
// ---------------------------------------------------------------------------

/// Orchestrates the activity state machine and the approval engine.
pub struct ActivityWorkflow {
    pool: DbPool,
    definition: Arc<WorkflowDefinition>,
    bus: Arc<EventBus>,
}

impl ActivityWorkflow {
    pub fn new(pool: DbPool, definition: Arc<WorkflowDefinition>, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            definition,
            bus,
        }
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    fn ensure_can_edit(
        &self,
        actor: &Actor,
        activity: &Activity,
        fields: &ActivityFields,
    ) -> Result<(), CoreError> {
        if actor.can_edit(&self.definition, &activity.owner, fields) {
            return Ok(());
        }
        tracing::warn!(activity_id = activity.id, actor = %actor.username, "Edit denied");
        Err(CoreError::PermissionDenied(format!(
            "{} may not edit activity {}",
            actor.username, activity.id
        )))
    }

    fn publish(&self, events: Vec<PlatformEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }

    // -- editing --------------------------------------------------------

    /// Store a work-in-progress form.
    ///
    /// With no id a new AUTOSAVE activity is created. Existing activities
    /// can only be autosaved before they are submitted, and keep their
    /// status. A DRAFT already has a calendar entry, so its backing event
    /// and conflicts follow the autosaved times.
    pub async fn autosave(
        &self,
        actor: &Actor,
        activity_id: Option<DbId>,
        input: ActivityInput,
    ) -> WorkflowResult<ActivityDetail> {
        let fields = input.into_fields()?;
        let mut tx = self.pool.begin().await?;

        let activity = match activity_id {
            None => {
                ActivityRepo::create(&mut tx, &actor.username, &fields, ActivityStatus::Autosave)
                    .await?
            }
            Some(id) => {
                let (current, original) = lock_activity(&mut tx, id).await?;
                self.ensure_can_edit(actor, &current, &original)?;
                let status = current.status()?;
                if !status.is_pre_review() {
                    return Err(CoreError::Conflict(format!(
                        "Activity {id} has been submitted; save it instead"
                    ))
                    .into());
                }
                let reset = resets_processing_flags(&changed_fields(&original, &fields));
                ActivityRepo::update_fields(&mut tx, id, &fields, status, None, reset)
                    .await?
                    .ok_or_else(|| activity_not_found(id))?
            }
        };
        let synced = if activity.status()? == ActivityStatus::Draft {
            Some(sync_backing_event(&mut tx, &activity, &fields).await?)
        } else {
            None
        };
        tx.commit().await?;

        tracing::debug!(activity_id = activity.id, owner = %activity.owner, "Activity autosaved");
        if let Some((event_id, sync)) = synced {
            self.publish(vec![conflicts_synced_event(event_id, actor, &sync)]);
        }
        Ok(detail(activity, &fields, &[]))
    }

    /// Explicitly save an activity.
    ///
    /// Input is validated before anything is written. A new activity starts
    /// as DRAFT and an AUTOSAVE is promoted to DRAFT. When `expected_version`
    /// is given and the row has moved on, the save fails with
    /// `ConcurrentModification`. Activities under review or approved have
    /// their approvals regenerated from the changed fields, which can send
    /// an approved activity back to review.
    pub async fn save(
        &self,
        actor: &Actor,
        activity_id: Option<DbId>,
        input: ActivityInput,
        expected_version: Option<i32>,
    ) -> WorkflowResult<ActivityDetail> {
        let fields = input.into_fields()?;
        let Some(id) = activity_id else {
            return self.create_draft(actor, fields).await;
        };
        let definition: &WorkflowDefinition = &self.definition;

        let mut tx = self.pool.begin().await?;
        let (current, original) = lock_activity(&mut tx, id).await?;
        let previous = current.status()?;
        ensure_editable(id, previous)?;
        self.ensure_can_edit(actor, &current, &original)?;
        if expected_version.is_some_and(|v| v != current.version) {
            return Err(CoreError::ConcurrentModification {
                entity: "Activity",
                id,
            }
            .into());
        }

        let changed = changed_fields(&original, &fields);
        let status = status_after_save(previous);
        let activity = ActivityRepo::update_fields(
            &mut tx,
            id,
            &fields,
            status,
            expected_version,
            resets_processing_flags(&changed),
        )
        .await?
        .ok_or(CoreError::ConcurrentModification {
            entity: "Activity",
            id,
        })?;

        let (activity, status, steps, previous_next_step) = if status.is_under_workflow() {
            let existing = load_steps(&mut *tx, id).await?;
            let previous_next_step = next_step(definition, &existing).map(|s| s.id);
            let plan = generate_approvals(
                definition,
                fields.campus,
                activity.created_at,
                &changed,
                &existing,
            );
            apply_plan(&mut tx, id, &plan).await?;
            let (activity, status, steps) = settle_status(&mut tx, activity, status).await?;
            (activity, status, steps, previous_next_step)
        } else {
            (activity, status, Vec::new(), None)
        };

        let notifications = plan_transition_notifications(&TransitionContext {
            definition,
            activity_id: id,
            owner: &activity.owner,
            fields: &fields,
            created_at: activity.created_at,
            previous,
            current: status,
            previous_next_step,
            steps: &steps,
            progressed: false,
            edited: !changed.is_empty(),
        });
        enqueue(&mut tx, id, &notifications).await?;

        let (event_id, sync) = sync_backing_event(&mut tx, &activity, &fields).await?;
        tx.commit().await?;

        tracing::info!(
            activity_id = id,
            actor = %actor.username,
            changed = changed.len(),
            from = previous.as_i16(),
            to = status.as_i16(),
            "Activity saved"
        );

        let mut events = vec![conflicts_synced_event(event_id, actor, &sync)];
        if previous != status {
            events.push(status_changed_event(id, actor, previous, status));
        }
        self.publish(events);

        Ok(detail(activity, &fields, &steps))
    }

    async fn create_draft(&self, actor: &Actor, fields: ActivityFields) -> WorkflowResult<ActivityDetail> {
        let mut tx = self.pool.begin().await?;
        let activity =
            ActivityRepo::create(&mut tx, &actor.username, &fields, ActivityStatus::Draft).await?;
        let (event_id, sync) = sync_backing_event(&mut tx, &activity, &fields).await?;
        tx.commit().await?;

        tracing::info!(activity_id = activity.id, owner = %actor.username, "Activity created");
        self.publish(vec![conflicts_synced_event(event_id, actor, &sync)]);
        Ok(detail(activity, &fields, &[]))
    }

    // -- state transitions ----------------------------------------------

    /// Send an AUTOSAVE or DRAFT activity for review.
    ///
    /// Generates the campus approval steps and derives the new status. An
    /// activity with no required steps is approved straight away.
    pub async fn submit(&self, actor: &Actor, activity_id: DbId) -> WorkflowResult<ActivityDetail> {
        let definition: &WorkflowDefinition = &self.definition;
        let mut tx = self.pool.begin().await?;
        let (current, fields) = lock_activity(&mut tx, activity_id).await?;
        let previous = current.status()?;
        ensure_can_submit(activity_id, previous)?;
        self.ensure_can_edit(actor, &current, &fields)?;

        let existing = load_steps(&mut *tx, activity_id).await?;
        let plan = generate_approvals(
            definition,
            fields.campus,
            current.created_at,
            &BTreeSet::new(),
            &existing,
        );
        apply_plan(&mut tx, activity_id, &plan).await?;
        let (activity, status, steps) =
            settle_status(&mut tx, current, ActivityStatus::InReview).await?;

        let notifications = plan_transition_notifications(&TransitionContext {
            definition,
            activity_id,
            owner: &activity.owner,
            fields: &fields,
            created_at: activity.created_at,
            previous,
            current: status,
            previous_next_step: None,
            steps: &steps,
            progressed: false,
            edited: false,
        });
        enqueue(&mut tx, activity_id, &notifications).await?;

        let (event_id, sync) = sync_backing_event(&mut tx, &activity, &fields).await?;
        tx.commit().await?;

        tracing::info!(
            activity_id,
            actor = %actor.username,
            steps = steps.iter().filter(|s| s.is_active()).count(),
            status = status.as_i16(),
            "Activity submitted for review"
        );
        self.publish(vec![
            status_changed_event(activity_id, actor, previous, status),
            conflicts_synced_event(event_id, actor, &sync),
        ]);

        Ok(detail(activity, &fields, &steps))
    }

    /// Set or clear the approval of one step.
    pub async fn approve(
        &self,
        actor: &Actor,
        activity_id: DbId,
        step_id: DbId,
        checked: bool,
    ) -> WorkflowResult<StepOutcome> {
        self.act_on_step(actor, activity_id, step_id, StepAction::Approve(checked))
            .await
    }

    /// Set or clear the skip flag of one skippable step.
    pub async fn skip(
        &self,
        actor: &Actor,
        activity_id: DbId,
        step_id: DbId,
        skip: bool,
    ) -> WorkflowResult<StepOutcome> {
        self.act_on_step(actor, activity_id, step_id, StepAction::Skip(skip))
            .await
    }

    async fn act_on_step(
        &self,
        actor: &Actor,
        activity_id: DbId,
        step_id: DbId,
        action: StepAction,
    ) -> WorkflowResult<StepOutcome> {
        let definition: &WorkflowDefinition = &self.definition;
        let mut tx = self.pool.begin().await?;
        let (current, fields) = lock_activity(&mut tx, activity_id).await?;
        let previous = current.status()?;
        if !previous.is_under_workflow() {
            return Err(CoreError::Conflict(format!(
                "Activity {activity_id} is not under review"
            ))
            .into());
        }

        let existing = load_steps(&mut *tx, activity_id).await?;
        let previous_next_step = next_step(definition, &existing).map(|s| s.id);

        let updated = match action {
            StepAction::Approve(checked) => {
                let step = authorize_approval(definition, &existing, step_id, actor, checked)?;
                let status = if checked {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Unapproved
                };
                ApprovalStepRepo::set_status(&mut *tx, step.id, status, &actor.username).await?
            }
            StepAction::Skip(skip) => {
                let step = authorize_skip(definition, &existing, step_id, actor)?;
                ApprovalStepRepo::set_skip(&mut *tx, step.id, skip, &actor.username).await?
            }
        }
        .ok_or(CoreError::NotFound {
            entity: "ApprovalStep",
            id: step_id,
        })?;

        let (activity, status, steps) = settle_status(&mut tx, current, previous).await?;

        let notifications = plan_transition_notifications(&TransitionContext {
            definition,
            activity_id,
            owner: &activity.owner,
            fields: &fields,
            created_at: activity.created_at,
            previous,
            current: status,
            previous_next_step,
            steps: &steps,
            progressed: true,
            edited: false,
        });
        enqueue(&mut tx, activity_id, &notifications).await?;
        tx.commit().await?;

        let step = updated.into_step()?;
        let (kind, payload) = match action {
            StepAction::Approve(checked) => (
                AuditKind::StepApproved,
                json!({ "step_id": step.id, "step_type": step.step_type.as_str(), "approved": checked }),
            ),
            StepAction::Skip(skip) => (
                AuditKind::StepSkipped,
                json!({ "step_id": step.id, "step_type": step.step_type.as_str(), "skip": skip }),
            ),
        };
        tracing::info!(
            activity_id,
            step_id,
            step_type = step.step_type.as_str(),
            actor = %actor.username,
            ?action,
            status = status.as_i16(),
            "Approval step actioned"
        );

        let mut events = vec![PlatformEvent::new(kind, activity_id, actor.username.as_str(), payload)];
        if previous != status {
            events.push(status_changed_event(activity_id, actor, previous, status));
        }
        self.publish(events);

        Ok(StepOutcome {
            stage: current_stage(&steps).map(str::to_string),
            step,
            status,
        })
    }

    /// Nominate a specific approver for a selectable step.
    pub async fn nominate(
        &self,
        actor: &Actor,
        activity_id: DbId,
        step_id: DbId,
        nominee: &str,
    ) -> WorkflowResult<StepOutcome> {
        let definition: &WorkflowDefinition = &self.definition;
        let mut tx = self.pool.begin().await?;
        let (current, fields) = lock_activity(&mut tx, activity_id).await?;
        let status = current.status()?;
        if !status.is_under_workflow() {
            return Err(CoreError::Conflict(format!(
                "Activity {activity_id} is not under review"
            ))
            .into());
        }

        let existing = load_steps(&mut *tx, activity_id).await?;
        let manages_activity = is_activity_staff(&current.owner, &fields, &actor.username);
        let step = authorize_nomination(
            definition,
            &existing,
            step_id,
            actor,
            nominee,
            manages_activity,
        )?;
        let updated = ApprovalStepRepo::set_nominated(&mut *tx, step.id, nominee)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ApprovalStep",
                id: step_id,
            })?
            .into_step()?;

        let steps = load_steps(&mut *tx, activity_id).await?;
        let ctx = TransitionContext {
            definition,
            activity_id,
            owner: &current.owner,
            fields: &fields,
            created_at: current.created_at,
            previous: status,
            current: status,
            previous_next_step: None,
            steps: &steps,
            progressed: false,
            edited: false,
        };
        let notifications = plan_nomination_notifications(&ctx, &updated, nominee);
        enqueue(&mut tx, activity_id, &notifications).await?;
        tx.commit().await?;

        tracing::info!(activity_id, step_id, nominee, actor = %actor.username, "Approver nominated");
        self.publish(vec![PlatformEvent::new(
            AuditKind::ApproverNominated,
            activity_id,
            actor.username.as_str(),
            json!({ "step_id": step_id, "nominee": nominee }),
        )]);

        Ok(StepOutcome {
            stage: current_stage(&steps).map(str::to_string),
            step: updated,
            status,
        })
    }

    /// Cancel an activity that has not been approved.
    pub async fn cancel(&self, actor: &Actor, activity_id: DbId) -> WorkflowResult<ActivityDetail> {
        let definition: &WorkflowDefinition = &self.definition;
        let mut tx = self.pool.begin().await?;
        let (current, fields) = lock_activity(&mut tx, activity_id).await?;
        let previous = current.status()?;
        self.ensure_can_edit(actor, &current, &fields)?;
        ensure_can_cancel(activity_id, previous)?;

        let activity = ActivityRepo::update_status(&mut *tx, activity_id, ActivityStatus::Cancelled)
            .await?
            .ok_or_else(|| activity_not_found(activity_id))?;
        retire_backing_event(&mut tx, activity_id).await?;

        let steps = load_steps(&mut *tx, activity_id).await?;
        let notifications = plan_cancellation_notifications(&TransitionContext {
            definition,
            activity_id,
            owner: &activity.owner,
            fields: &fields,
            created_at: activity.created_at,
            previous,
            current: ActivityStatus::Cancelled,
            previous_next_step: None,
            steps: &steps,
            progressed: false,
            edited: false,
        });
        enqueue(&mut tx, activity_id, &notifications).await?;
        tx.commit().await?;

        tracing::info!(activity_id, actor = %actor.username, "Activity cancelled");
        self.publish(vec![status_changed_event(
            activity_id,
            actor,
            previous,
            ActivityStatus::Cancelled,
        )]);

        Ok(detail(activity, &fields, &steps))
    }

    /// Delete an activity. Autosaves are removed outright; drafts and
    /// activities in review are flagged deleted.
    pub async fn delete(&self, actor: &Actor, activity_id: DbId) -> WorkflowResult<()> {
        let mut tx = self.pool.begin().await?;
        let (current, fields) = lock_activity(&mut tx, activity_id).await?;
        if !actor.can_delete(&self.definition, &current.owner, &fields) {
            tracing::warn!(activity_id, actor = %actor.username, "Delete denied");
            return Err(CoreError::PermissionDenied(format!(
                "{} may not delete activity {activity_id}",
                actor.username
            ))
            .into());
        }

        let mode = deletion_mode(activity_id, current.status()?)?;
        match mode {
            DeleteMode::Hard => {
                ActivityRepo::hard_delete(&mut *tx, activity_id).await?;
            }
            DeleteMode::Soft => {
                ActivityRepo::soft_delete(&mut *tx, activity_id).await?;
                retire_backing_event(&mut tx, activity_id).await?;
            }
        }
        tx.commit().await?;

        let mode_name = match mode {
            DeleteMode::Hard => "hard",
            DeleteMode::Soft => "soft",
        };
        tracing::info!(activity_id, actor = %actor.username, mode = mode_name, "Activity deleted");
        self.publish(vec![PlatformEvent::new(
            AuditKind::ActivityDeleted,
            activity_id,
            actor.username.as_str(),
            json!({ "mode": mode_name }),
        )]);
        Ok(())
    }

    // -- queries --------------------------------------------------------

    /// Load an activity for display.
    ///
    /// Autosaves are only visible to their owner. Other activities are
    /// visible to staff, the people on the activity, and campus approvers.
    pub async fn get(&self, actor: &Actor, activity_id: DbId) -> WorkflowResult<ActivityView> {
        let activity = ActivityRepo::find_by_id(&self.pool, activity_id)
            .await?
            .ok_or_else(|| activity_not_found(activity_id))?;
        let lists = ActivityRepo::load_lists(&self.pool, activity_id).await?;
        let fields = activity.fields(&lists)?;

        if activity.status()? == ActivityStatus::Autosave && activity.owner != actor.username {
            return Err(activity_not_found(activity_id).into());
        }
        let manages_activity = is_activity_staff(&activity.owner, &fields, &actor.username);
        if !actor.is_staff && !manages_activity && !actor.approves_campus(&self.definition, &fields) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not view activity {activity_id}",
                actor.username
            ))
            .into());
        }

        let steps = load_steps(&self.pool, activity_id).await?;
        let can_edit = actor.can_edit(&self.definition, &activity.owner, &fields);
        let can_delete = actor.can_delete(&self.definition, &activity.owner, &fields);
        Ok(ActivityView {
            steps: step_views(&self.definition, &steps, actor, manages_activity),
            detail: detail(activity, &fields, &steps),
            can_edit,
            can_delete,
        })
    }

    /// Activities in review that are waiting on the actor.
    ///
    /// An activity qualifies when its next actionable step is nominated to
    /// the actor, or has no nominee and is one of the actor's step types.
    pub async fn list_for_approver(&self, actor: &Actor) -> WorkflowResult<Vec<ActivitySummary>> {
        if !actor.is_approver() {
            return Ok(Vec::new());
        }
        let activities = ActivityRepo::list_by_status(&self.pool, ActivityStatus::InReview).await?;
        let ids: Vec<DbId> = activities.iter().map(|a| a.id).collect();
        let grouped = steps_by_activity(&self.pool, &ids).await?;

        let mut out = Vec::new();
        for activity in activities {
            let steps = grouped.get(&activity.id).map(Vec::as_slice).unwrap_or_default();
            let Some(next) = next_step(&self.definition, steps) else {
                continue;
            };
            let waiting = match &next.nominated {
                Some(nominee) => *nominee == actor.username,
                None => actor.can_action(next.step_type),
            };
            if waiting {
                out.push(ActivitySummary {
                    stage: current_stage(steps).map(str::to_string),
                    activity,
                });
            }
        }
        Ok(out)
    }

    /// Activities the actor created, leads, plans, or accompanies.
    pub async fn list_for_user(&self, actor: &Actor) -> WorkflowResult<Vec<ActivitySummary>> {
        let activities = ActivityRepo::list_for_user(&self.pool, &actor.username).await?;
        let ids: Vec<DbId> = activities.iter().map(|a| a.id).collect();
        let grouped = steps_by_activity(&self.pool, &ids).await?;

        Ok(activities
            .into_iter()
            .map(|activity| {
                let stage = grouped
                    .get(&activity.id)
                    .and_then(|steps| current_stage(steps))
                    .map(str::to_string);
                ActivitySummary { activity, stage }
            })
            .collect())
    }
}
