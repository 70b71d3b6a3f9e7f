//! Notification fan-out for workflow transitions.
//!
//! Everything here is pure: the workflow layer passes in the before/after
//! state of a transition and gets back the list of messages to enqueue.
//! Delivery happens elsewhere, after commit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::{ActivityFields, ActivityStatus};
use crate::approval::{approvers_for_step, next_step, ApprovalStep};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::workflow::WorkflowDefinition;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub const TEMPLATE_APPROVAL_REQUIRED: &str = "approval_required";
pub const TEMPLATE_STATUS_CHANGED: &str = "status_changed";
pub const TEMPLATE_WORKFLOW_PROGRESSED: &str = "workflow_progressed";
pub const TEMPLATE_ACTIVITY_APPROVED: &str = "activity_approved";
pub const TEMPLATE_DATA_CHANGED: &str = "data_changed";
pub const TEMPLATE_APPROVER_NOMINATED: &str = "approver_nominated";
pub const TEMPLATE_ACTIVITY_CANCELLED: &str = "activity_cancelled";

/// Message kinds sent by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    ApprovalRequired,
    StatusChanged,
    WorkflowProgressed,
    ActivityApproved,
    DataChanged,
    ApproverNominated,
    ActivityCancelled,
}

impl Template {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            TEMPLATE_APPROVAL_REQUIRED => Ok(Self::ApprovalRequired),
            TEMPLATE_STATUS_CHANGED => Ok(Self::StatusChanged),
            TEMPLATE_WORKFLOW_PROGRESSED => Ok(Self::WorkflowProgressed),
            TEMPLATE_ACTIVITY_APPROVED => Ok(Self::ActivityApproved),
            TEMPLATE_DATA_CHANGED => Ok(Self::DataChanged),
            TEMPLATE_APPROVER_NOMINATED => Ok(Self::ApproverNominated),
            TEMPLATE_ACTIVITY_CANCELLED => Ok(Self::ActivityCancelled),
            _ => Err(CoreError::Internal(format!("Unknown notification template '{s}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequired => TEMPLATE_APPROVAL_REQUIRED,
            Self::StatusChanged => TEMPLATE_STATUS_CHANGED,
            Self::WorkflowProgressed => TEMPLATE_WORKFLOW_PROGRESSED,
            Self::ActivityApproved => TEMPLATE_ACTIVITY_APPROVED,
            Self::DataChanged => TEMPLATE_DATA_CHANGED,
            Self::ApproverNominated => TEMPLATE_APPROVER_NOMINATED,
            Self::ActivityCancelled => TEMPLATE_ACTIVITY_CANCELLED,
        }
    }
}

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub template: Template,
    pub recipient: String,
    pub context: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Transition planning
// ---------------------------------------------------------------------------

/// Before/after view of an activity around one workflow operation.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub definition: &'a WorkflowDefinition,
    pub activity_id: DbId,
    pub owner: &'a str,
    pub fields: &'a ActivityFields,
    pub created_at: Timestamp,
    pub previous: ActivityStatus,
    pub current: ActivityStatus,
    /// Id of the step that was next before the operation.
    pub previous_next_step: Option<DbId>,
    /// Step rows after the operation.
    pub steps: &'a [ApprovalStep],
    /// An approval or skip was recorded.
    pub progressed: bool,
    /// Activity fields were edited.
    pub edited: bool,
}

impl TransitionContext<'_> {
    fn base_context(&self) -> serde_json::Value {
        json!({
            "activity_id": self.activity_id,
            "activity_name": self.fields.activity_name,
            "status": self.current.as_i16(),
            "stage": crate::approval::current_stage(self.steps),
        })
    }
}

/// Messages to send for a transition.
pub fn plan_transition_notifications(ctx: &TransitionContext<'_>) -> Vec<Notification> {
    let mut out = Vec::new();
    let context = ctx.base_context();
    let next = next_step(ctx.definition, ctx.steps);

    if ctx.current == ActivityStatus::InReview {
        let entered = ctx.previous != ActivityStatus::InReview;
        let moved = next.map(|s| s.id) != ctx.previous_next_step;
        if let Some(step) = next.filter(|_| entered || moved) {
            for username in approvers_for_step(ctx.definition, step) {
                out.push(Notification {
                    template: Template::ApprovalRequired,
                    recipient: username,
                    context: context.clone(),
                });
            }
        }
    }

    let status_changed = ctx.previous != ctx.current;
    if status_changed
        && !ctx.current.is_pre_review()
        && ctx.current != ActivityStatus::Approved
    {
        out.push(Notification {
            template: Template::StatusChanged,
            recipient: ctx.owner.to_string(),
            context: context.clone(),
        });
    }

    if !status_changed && ctx.current == ActivityStatus::InReview && ctx.progressed {
        out.push(Notification {
            template: Template::WorkflowProgressed,
            recipient: ctx.owner.to_string(),
            context: context.clone(),
        });
    }

    if status_changed && ctx.current == ActivityStatus::Approved {
        for username in audience(ctx) {
            out.push(Notification {
                template: Template::ActivityApproved,
                recipient: username,
                context: context.clone(),
            });
        }
    }

    if !status_changed && ctx.current == ActivityStatus::Approved && ctx.edited {
        for username in audience(ctx) {
            out.push(Notification {
                template: Template::DataChanged,
                recipient: username,
                context: context.clone(),
            });
        }
    }

    out
}

/// Messages for a cancelled activity.
///
/// The creator always hears about the status change. The wider audience is
/// only told when the activity had been saved as a draft or further.
pub fn plan_cancellation_notifications(ctx: &TransitionContext<'_>) -> Vec<Notification> {
    let mut out = Vec::new();
    if ctx.previous == ActivityStatus::Cancelled {
        return out;
    }
    let context = ctx.base_context();
    out.push(Notification {
        template: Template::StatusChanged,
        recipient: ctx.owner.to_string(),
        context: context.clone(),
    });
    if ctx.previous != ActivityStatus::Autosave {
        out.extend(audience(ctx).into_iter().map(|recipient| Notification {
            template: Template::ActivityCancelled,
            recipient,
            context: context.clone(),
        }));
    }
    out
}

/// Messages for a nomination: the nominee and the creator.
pub fn plan_nomination_notifications(
    ctx: &TransitionContext<'_>,
    step: &ApprovalStep,
    nominee: &str,
) -> Vec<Notification> {
    let mut context = ctx.base_context();
    context["nominee"] = json!(nominee);
    context["step"] = json!(step.description);

    let mut recipients = vec![nominee.to_string()];
    if ctx.owner != nominee {
        recipients.push(ctx.owner.to_string());
    }
    recipients
        .into_iter()
        .map(|recipient| Notification {
            template: Template::ApproverNominated,
            recipient,
            context: context.clone(),
        })
        .collect()
}

/// Everyone with a stake in the activity, deduplicated by username.
///
/// Approvers of required steps with notifications disabled are left out
/// unless they are also activity staff.
fn audience(ctx: &TransitionContext<'_>) -> Vec<String> {
    let definition = ctx.definition;
    let required = definition.required_steps(ctx.fields.campus, ctx.created_at);

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let mut push = |username: &str| {
        if !username.is_empty() && seen.insert(username.to_string()) {
            out.push(username.to_string());
        }
    };

    push(ctx.owner);
    push(ctx.fields.staff_in_charge.as_str());
    for username in ctx.fields.planning_staff.iter().chain(&ctx.fields.accompanying_staff) {
        push(username.as_str());
    }

    let wants_mail = |username: &str| {
        required
            .iter()
            .filter_map(|t| definition.approver(*t, username))
            .all(|a| a.notify)
    };

    for step_type in &required {
        if let Some(def) = definition.definition(*step_type) {
            for approver in def.approvers.iter().filter(|a| a.notify) {
                push(approver.username.as_str());
            }
        }
    }
    for step in ctx.steps.iter().filter(|s| s.is_active()) {
        for username in step.username.iter().chain(step.nominated.iter()) {
            if wants_mail(username.as_str()) {
                push(username.as_str());
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Delivery address for a user: the approver override when configured,
/// else `username@domain`.
pub fn recipient_address(definition: &WorkflowDefinition, username: &str, domain: &str) -> String {
    definition
        .find_approver(username)
        .and_then(|a| a.email.clone())
        .unwrap_or_else(|| format!("{username}@{domain}"))
}

fn status_label(code: i64) -> &'static str {
    match code {
        0 => "autosaved",
        1 => "draft",
        2 => "in review",
        3 => "approved",
        4 => "cancelled",
        _ => "unknown",
    }
}

/// Subject and plain-text body for a stored notification.
pub fn render(template: Template, context: &serde_json::Value) -> (String, String) {
    let name = context["activity_name"].as_str().unwrap_or("Activity");
    let id = context["activity_id"].as_i64().unwrap_or_default();
    let stage = context["stage"].as_str().unwrap_or("final sign-off");
    let status = status_label(context["status"].as_i64().unwrap_or(-1));

    match template {
        Template::ApprovalRequired => (
            format!("Approval required: {name}"),
            format!("Activity #{id} \"{name}\" is waiting for your approval at stage: {stage}."),
        ),
        Template::StatusChanged => (
            format!("{name} is now {status}"),
            format!("The status of activity #{id} \"{name}\" changed to {status}."),
        ),
        Template::WorkflowProgressed => (
            format!("{name}: approval progressed"),
            format!("Activity #{id} \"{name}\" moved forward. Current stage: {stage}."),
        ),
        Template::ActivityApproved => (
            format!("{name} has been approved"),
            format!("Activity #{id} \"{name}\" is fully approved."),
        ),
        Template::DataChanged => (
            format!("{name} was updated"),
            format!("Details of approved activity #{id} \"{name}\" were changed."),
        ),
        Template::ApproverNominated => {
            let nominee = context["nominee"].as_str().unwrap_or("an approver");
            let step = context["step"].as_str().unwrap_or(stage);
            (
                format!("{name}: approver nominated"),
                format!("{nominee} was nominated to approve \"{step}\" for activity #{id} \"{name}\"."),
            )
        }
        Template::ActivityCancelled => (
            format!("{name} was cancelled"),
            format!("Activity #{id} \"{name}\" has been cancelled."),
        ),
    }
}
