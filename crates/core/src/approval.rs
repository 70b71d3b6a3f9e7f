//! Approval engine: plans step rows for an activity, gates approvals on
//! prerequisites, and works out who acts next.
//!
//! Functions here take the activity's current step rows (active and
//! invalidated) and return plans or decisions; the caller persists them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::activity::Campus;
use crate::actor::Actor;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::workflow::{StepType, WorkflowDefinition};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Decision recorded on a step. Discriminants are the stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[repr(i16)]
pub enum ApprovalStatus {
    Unapproved = 0,
    Approved = 1,
    /// Representable for stored data; no operation produces it.
    Rejected = 2,
}

impl ApprovalStatus {
    pub fn from_i16(value: i16) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Unapproved),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Rejected),
            other => Err(CoreError::Internal(format!(
                "Unknown approval status code {other}"
            ))),
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl From<ApprovalStatus> for i16 {
    fn from(status: ApprovalStatus) -> Self {
        status.as_i16()
    }
}

impl TryFrom<i16> for ApprovalStatus {
    type Error = CoreError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_i16(value)
    }
}

// ---------------------------------------------------------------------------
// Step rows
// ---------------------------------------------------------------------------

/// One approval step row belonging to an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: DbId,
    pub activity_id: DbId,
    pub step_type: StepType,
    pub sequence: i32,
    pub description: String,
    pub status: ApprovalStatus,
    pub skip: bool,
    pub invalidated: bool,
    /// Approver suggested by the activity staff.
    pub nominated: Option<String>,
    /// Who last actioned the step.
    pub username: Option<String>,
    pub timecreated: Timestamp,
    pub timemodified: Timestamp,
}

impl ApprovalStep {
    pub fn is_active(&self) -> bool {
        !self.invalidated
    }

    /// A decision has been recorded on the step.
    pub fn is_actioned(&self) -> bool {
        self.status != ApprovalStatus::Unapproved
    }

    /// Whether this row lets steps that depend on it proceed.
    pub fn clears_prerequisite(&self) -> bool {
        self.skip || self.status == ApprovalStatus::Approved
    }
}

/// A step row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApprovalStep {
    pub step_type: StepType,
    pub sequence: i32,
    pub description: String,
}

/// Row changes produced by [`generate_approvals`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalPlan {
    /// Ids of active rows to mark `invalidated`.
    pub invalidate: Vec<DbId>,
    pub insert: Vec<NewApprovalStep>,
}

impl ApprovalPlan {
    pub fn is_empty(&self) -> bool {
        self.invalidate.is_empty() && self.insert.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Plan the step rows for an activity after an edit.
///
/// 1. Active, actioned rows whose type is invalidated by `changed` (directly
///    or through a prerequisite) are invalidated.
/// 2. Active rows whose type is no longer required for `campus` are
///    invalidated.
/// 3. Every required type left without an active row gets a fresh
///    unapproved row.
///
/// Calling it again with an empty `changed` set on the resulting rows yields
/// an empty plan.
pub fn generate_approvals(
    definition: &WorkflowDefinition,
    campus: Campus,
    created_at: Timestamp,
    changed: &BTreeSet<String>,
    steps: &[ApprovalStep],
) -> ApprovalPlan {
    let invalidated_types = definition.invalidated_by(changed);
    let required = definition.required_steps(campus, created_at);

    let mut invalidate = BTreeSet::new();
    for step in steps.iter().filter(|s| s.is_active()) {
        let edited = invalidated_types.contains(&step.step_type) && step.is_actioned();
        let unrequired = !required.contains(&step.step_type);
        if edited || unrequired {
            invalidate.insert(step.id);
        }
    }

    let still_active: BTreeSet<StepType> = steps
        .iter()
        .filter(|s| s.is_active() && !invalidate.contains(&s.id))
        .map(|s| s.step_type)
        .collect();

    let insert = required
        .iter()
        .enumerate()
        .filter(|(_, step_type)| !still_active.contains(step_type))
        .map(|(index, step_type)| NewApprovalStep {
            step_type: *step_type,
            sequence: index as i32 + 1,
            description: definition
                .definition(*step_type)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| step_type.as_str().to_string()),
        })
        .collect();

    ApprovalPlan {
        invalidate: invalidate.into_iter().collect(),
        insert,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Active, non-skipped, undecided steps in sequence order.
///
/// The first entry is the activity's current stage; an empty result means
/// the activity is fully approved.
pub fn unactioned_steps(steps: &[ApprovalStep]) -> Vec<&ApprovalStep> {
    let mut pending: Vec<&ApprovalStep> = steps
        .iter()
        .filter(|s| s.is_active() && !s.skip && s.status == ApprovalStatus::Unapproved)
        .collect();
    pending.sort_by_key(|s| (s.sequence, s.id));
    pending
}

/// User-facing name of the current stage, if any step is outstanding.
pub fn current_stage(steps: &[ApprovalStep]) -> Option<&str> {
    unactioned_steps(steps)
        .first()
        .map(|s| s.description.as_str())
}

/// Whether every prerequisite of `step_type` is approved or skipped.
///
/// Prerequisite types with no active row (not required for this activity)
/// do not block.
pub fn prerequisites_met(
    definition: &WorkflowDefinition,
    steps: &[ApprovalStep],
    step_type: StepType,
) -> bool {
    let Some(def) = definition.definition(step_type) else {
        return true;
    };
    def.prerequisites.iter().all(|prerequisite| {
        steps
            .iter()
            .filter(|s| s.is_active() && s.step_type == *prerequisite)
            .all(ApprovalStep::clears_prerequisite)
    })
}

/// The first unactioned step whose prerequisites are met. Only this step's
/// approvers are asked to act.
pub fn next_step<'a>(
    definition: &WorkflowDefinition,
    steps: &'a [ApprovalStep],
) -> Option<&'a ApprovalStep> {
    unactioned_steps(steps)
        .into_iter()
        .find(|s| prerequisites_met(definition, steps, s.step_type))
}

/// Who should action `step`: the nominee when one is set, else the roster.
pub fn approvers_for_step(definition: &WorkflowDefinition, step: &ApprovalStep) -> Vec<String> {
    if let Some(nominee) = &step.nominated {
        return vec![nominee.clone()];
    }
    definition
        .definition(step.step_type)
        .map(|d| d.approvers.iter().map(|a| a.username.clone()).collect())
        .unwrap_or_default()
}

/// Whether `actor` may approve `step` right now.
pub fn can_approve(
    definition: &WorkflowDefinition,
    steps: &[ApprovalStep],
    step: &ApprovalStep,
    actor: &Actor,
) -> bool {
    step.is_active()
        && actor.can_action(step.step_type)
        && prerequisites_met(definition, steps, step.step_type)
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Look up an active step by id.
pub fn find_active_step(steps: &[ApprovalStep], step_id: DbId) -> Result<&ApprovalStep, CoreError> {
    steps
        .iter()
        .find(|s| s.id == step_id && s.is_active())
        .ok_or(CoreError::NotFound {
            entity: "ApprovalStep",
            id: step_id,
        })
}

/// Check that `actor` may set the approval flag of a step.
///
/// Withdrawing an approval (`checked = false`) only needs the approver
/// type; granting one also needs every prerequisite cleared.
pub fn authorize_approval<'a>(
    definition: &WorkflowDefinition,
    steps: &'a [ApprovalStep],
    step_id: DbId,
    actor: &Actor,
    checked: bool,
) -> Result<&'a ApprovalStep, CoreError> {
    let step = find_active_step(steps, step_id)?;

    if !actor.can_action(step.step_type) {
        return Err(CoreError::PermissionDenied(format!(
            "{} is not an approver for '{}'",
            actor.username,
            step.step_type.as_str()
        )));
    }

    if checked && !prerequisites_met(definition, steps, step.step_type) {
        return Err(CoreError::Conflict(format!(
            "Step '{}' is waiting on its prerequisites",
            step.description
        )));
    }

    Ok(step)
}

/// Check that `actor` may toggle the skip flag of a step.
pub fn authorize_skip<'a>(
    definition: &WorkflowDefinition,
    steps: &'a [ApprovalStep],
    step_id: DbId,
    actor: &Actor,
) -> Result<&'a ApprovalStep, CoreError> {
    let step = find_active_step(steps, step_id)?;
    let def = definition.require_definition(step.step_type)?;

    if !def.skippable {
        return Err(CoreError::Validation(format!(
            "Step '{}' cannot be skipped",
            step.description
        )));
    }
    if !actor.can_action(step.step_type) {
        return Err(CoreError::PermissionDenied(format!(
            "{} is not an approver for '{}'",
            actor.username,
            step.step_type.as_str()
        )));
    }
    Ok(step)
}

/// Check that `actor` may nominate `nominee` for a step.
///
/// `manages_activity` is true when the actor is the creator or on the
/// activity staff; approvers of the step type may nominate too.
pub fn authorize_nomination<'a>(
    definition: &WorkflowDefinition,
    steps: &'a [ApprovalStep],
    step_id: DbId,
    actor: &Actor,
    nominee: &str,
    manages_activity: bool,
) -> Result<&'a ApprovalStep, CoreError> {
    let step = find_active_step(steps, step_id)?;
    let def = definition.require_definition(step.step_type)?;

    if !def.selectable {
        return Err(CoreError::Validation(format!(
            "Step '{}' does not accept a nominated approver",
            step.description
        )));
    }
    if !manages_activity && !actor.can_action(step.step_type) {
        return Err(CoreError::PermissionDenied(format!(
            "{} cannot nominate approvers for this activity",
            actor.username
        )));
    }
    if !def.approvers.iter().any(|a| a.username == nominee) {
        return Err(CoreError::Validation(format!(
            "{nominee} is not an approver for '{}'",
            step.step_type.as_str()
        )));
    }
    if step.is_actioned() {
        return Err(CoreError::Conflict(format!(
            "Step '{}' has already been actioned",
            step.description
        )));
    }
    Ok(step)
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A step row annotated with what the viewing user may do.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    #[serde(flatten)]
    pub step: ApprovalStep,
    pub can_approve: bool,
    pub can_skip: bool,
    pub can_nominate: bool,
    /// Usernames that may be nominated, for selectable steps.
    pub selectable_approvers: Vec<String>,
}

/// Active steps in sequence order with per-actor capabilities.
pub fn step_views(
    definition: &WorkflowDefinition,
    steps: &[ApprovalStep],
    actor: &Actor,
    manages_activity: bool,
) -> Vec<StepView> {
    let mut active: Vec<&ApprovalStep> = steps.iter().filter(|s| s.is_active()).collect();
    active.sort_by_key(|s| (s.sequence, s.id));

    active
        .into_iter()
        .map(|step| {
            let def = definition.definition(step.step_type);
            let skippable = def.is_some_and(|d| d.skippable);
            let selectable = def.is_some_and(|d| d.selectable);
            StepView {
                step: step.clone(),
                can_approve: can_approve(definition, steps, step, actor),
                can_skip: skippable && actor.can_action(step.step_type),
                can_nominate: selectable
                    && !step.is_actioned()
                    && (manages_activity || actor.can_action(step.step_type)),
                selectable_approvers: match def {
                    Some(d) if d.selectable => {
                        d.approvers.iter().map(|a| a.username.clone()).collect()
                    }
                    _ => Vec::new(),
                },
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::workflow::tests::sample_definition;

    pub(crate) fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap()
    }

    /// Apply a plan to in-memory rows the way the repository does.
    pub(crate) fn apply_plan(steps: &mut Vec<ApprovalStep>, plan: &ApprovalPlan) {
        for step in steps.iter_mut() {
            if plan.invalidate.contains(&step.id) {
                step.invalidated = true;
            }
        }
        let mut next_id = steps.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        for new in &plan.insert {
            steps.push(ApprovalStep {
                id: next_id,
                activity_id: 1,
                step_type: new.step_type,
                sequence: new.sequence,
                description: new.description.clone(),
                status: ApprovalStatus::Unapproved,
                skip: false,
                invalidated: false,
                nominated: None,
                username: None,
                timecreated: now(),
                timemodified: now(),
            });
            next_id += 1;
        }
    }

    pub(crate) fn set_status(steps: &mut [ApprovalStep], step_id: DbId, status: ApprovalStatus) {
        if let Some(step) = steps.iter_mut().find(|s| s.id == step_id) {
            step.status = status;
        }
    }

    pub(crate) fn active_id(steps: &[ApprovalStep], step_type: StepType) -> DbId {
        steps
            .iter()
            .find(|s| s.is_active() && s.step_type == step_type)
            .map(|s| s.id)
            .unwrap()
    }

    fn fresh_senior() -> (WorkflowDefinition, Vec<ApprovalStep>) {
        let def = sample_definition();
        let mut steps = Vec::new();
        let plan = generate_approvals(&def, Campus::Senior, now(), &BTreeSet::new(), &steps);
        apply_plan(&mut steps, &plan);
        (def, steps)
    }

    fn changed(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn first_generation_inserts_campus_sequence() {
        let (_, steps) = fresh_senior();
        let types: Vec<_> = steps.iter().map(|s| (s.step_type, s.sequence)).collect();
        assert_eq!(
            types,
            vec![
                (StepType::SeniorRa, 1),
                (StepType::SeniorAdmin, 2),
                (StepType::SeniorHoss, 3)
            ]
        );
        assert_eq!(steps[2].description, "Head of Senior School");
    }

    #[test]
    fn generation_is_idempotent() {
        let (def, steps) = fresh_senior();
        let again = generate_approvals(&def, Campus::Senior, now(), &BTreeSet::new(), &steps);
        assert!(again.is_empty());
    }

    #[test]
    fn legacy_activity_skips_exempt_step() {
        let def = sample_definition();
        let old = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let plan = generate_approvals(&def, Campus::Senior, old, &BTreeSet::new(), &[]);
        let types: Vec<_> = plan.insert.iter().map(|n| n.step_type).collect();
        assert_eq!(types, vec![StepType::SeniorAdmin, StepType::SeniorHoss]);
    }

    #[test]
    fn edit_invalidates_only_actioned_rows() {
        let (def, mut steps) = fresh_senior();
        let ra = active_id(&steps, StepType::SeniorRa);
        set_status(&mut steps, ra, ApprovalStatus::Approved);

        // Cost edit targets senior_admin (unactioned) and senior_hoss (unactioned).
        let plan = generate_approvals(&def, Campus::Senior, now(), &changed(&["cost"]), &steps);
        assert!(plan.is_empty());

        // Location edit targets the approved senior_ra.
        let plan = generate_approvals(&def, Campus::Senior, now(), &changed(&["location"]), &steps);
        assert_eq!(plan.invalidate, vec![ra]);
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.insert[0].step_type, StepType::SeniorRa);
        assert_eq!(plan.insert[0].sequence, 1);
    }

    #[test]
    fn invalidation_never_revives_rows() {
        let (def, mut steps) = fresh_senior();
        let ra = active_id(&steps, StepType::SeniorRa);
        set_status(&mut steps, ra, ApprovalStatus::Approved);
        let plan = generate_approvals(&def, Campus::Senior, now(), &changed(&["location"]), &steps);
        apply_plan(&mut steps, &plan);

        let old = steps.iter().find(|s| s.id == ra).unwrap();
        assert!(old.invalidated);

        let plan = generate_approvals(&def, Campus::Senior, now(), &changed(&["details"]), &steps);
        assert!(plan.is_empty());
        assert!(steps.iter().find(|s| s.id == ra).unwrap().invalidated);
    }

    #[test]
    fn campus_change_replaces_sequence() {
        let (def, mut steps) = fresh_senior();
        let plan = generate_approvals(&def, Campus::Primary, now(), &changed(&["campus"]), &steps);
        assert_eq!(plan.invalidate.len(), 3);
        let types: Vec<_> = plan.insert.iter().map(|n| n.step_type).collect();
        assert_eq!(types, vec![StepType::PrimaryRa, StepType::PrimaryHops]);

        apply_plan(&mut steps, &plan);
        assert_eq!(unactioned_steps(&steps).len(), 2);
    }

    #[test]
    fn prerequisites_gate_final_sign_off() {
        let (def, mut steps) = fresh_senior();
        let hoss_actor = Actor::new("hoss", true, &def);
        let hoss = active_id(&steps, StepType::SeniorHoss);

        assert_matches!(
            authorize_approval(&def, &steps, hoss, &hoss_actor, true),
            Err(CoreError::Conflict(_))
        );

        let ra = active_id(&steps, StepType::SeniorRa);
        let admin = active_id(&steps, StepType::SeniorAdmin);
        set_status(&mut steps, ra, ApprovalStatus::Approved);
        let hoss_step = steps.iter().find(|s| s.id == hoss).unwrap().clone();
        assert!(!can_approve(&def, &steps, &hoss_step, &hoss_actor));

        set_status(&mut steps, admin, ApprovalStatus::Approved);
        assert!(can_approve(&def, &steps, &hoss_step, &hoss_actor));
        assert!(authorize_approval(&def, &steps, hoss, &hoss_actor, true).is_ok());
    }

    #[test]
    fn senior_review_runs_to_approval_then_reopens_on_time_edit() {
        use crate::activity::{derive_status, ActivityStatus};

        let (def, mut steps) = fresh_senior();
        let mut status = ActivityStatus::InReview;
        for step_type in [StepType::SeniorRa, StepType::SeniorAdmin, StepType::SeniorHoss] {
            let id = active_id(&steps, step_type);
            set_status(&mut steps, id, ApprovalStatus::Approved);
            status = derive_status(status, !unactioned_steps(&steps).is_empty());
        }
        assert_eq!(status, ActivityStatus::Approved);

        let old_hoss = active_id(&steps, StepType::SeniorHoss);
        let plan = generate_approvals(&def, Campus::Senior, now(), &changed(&["timestart"]), &steps);
        assert_eq!(plan.invalidate, vec![old_hoss]);
        assert_eq!(plan.insert.len(), 1);
        assert_eq!(plan.insert[0].step_type, StepType::SeniorHoss);
        assert_eq!(plan.insert[0].sequence, 3);

        apply_plan(&mut steps, &plan);
        status = derive_status(status, !unactioned_steps(&steps).is_empty());
        assert_eq!(status, ActivityStatus::InReview);
        assert_ne!(active_id(&steps, StepType::SeniorHoss), old_hoss);
    }

    #[test]
    fn skipped_prerequisite_does_not_block() {
        let (def, mut steps) = fresh_senior();
        let ra = active_id(&steps, StepType::SeniorRa);
        let admin = active_id(&steps, StepType::SeniorAdmin);
        steps.iter_mut().find(|s| s.id == ra).unwrap().skip = true;
        set_status(&mut steps, admin, ApprovalStatus::Approved);

        assert!(prerequisites_met(&def, &steps, StepType::SeniorHoss));
        let remaining: Vec<_> = unactioned_steps(&steps).iter().map(|s| s.step_type).collect();
        assert_eq!(remaining, vec![StepType::SeniorHoss]);
    }

    #[test]
    fn rejected_prerequisite_blocks() {
        let (def, mut steps) = fresh_senior();
        let ra = active_id(&steps, StepType::SeniorRa);
        let admin = active_id(&steps, StepType::SeniorAdmin);
        set_status(&mut steps, ra, ApprovalStatus::Rejected);
        set_status(&mut steps, admin, ApprovalStatus::Approved);
        assert!(!prerequisites_met(&def, &steps, StepType::SeniorHoss));
    }

    #[test]
    fn non_approver_is_denied() {
        let (def, steps) = fresh_senior();
        let teacher = Actor::new("teacher", true, &def);
        let ra = active_id(&steps, StepType::SeniorRa);
        assert_matches!(
            authorize_approval(&def, &steps, ra, &teacher, true),
            Err(CoreError::PermissionDenied(_))
        );
        assert_matches!(
            authorize_skip(&def, &steps, ra, &teacher),
            Err(CoreError::PermissionDenied(_))
        );
    }

    #[test]
    fn invalidated_step_is_not_found() {
        let (def, mut steps) = fresh_senior();
        let ra = active_id(&steps, StepType::SeniorRa);
        steps.iter_mut().find(|s| s.id == ra).unwrap().invalidated = true;
        let officer = Actor::new("ra_officer", true, &def);
        assert_matches!(
            authorize_approval(&def, &steps, ra, &officer, true),
            Err(CoreError::NotFound { entity: "ApprovalStep", .. })
        );
    }

    #[test]
    fn only_skippable_steps_can_be_skipped() {
        let (def, steps) = fresh_senior();
        let admin_actor = Actor::new("admin1", true, &def);
        let admin = active_id(&steps, StepType::SeniorAdmin);
        assert_matches!(
            authorize_skip(&def, &steps, admin, &admin_actor),
            Err(CoreError::Validation(_))
        );

        let officer = Actor::new("ra_officer", true, &def);
        let ra = active_id(&steps, StepType::SeniorRa);
        assert!(authorize_skip(&def, &steps, ra, &officer).is_ok());
    }

    #[test]
    fn nomination_rules() {
        let (def, steps) = fresh_senior();
        let teacher = Actor::new("teacher", true, &def);
        let hoss = active_id(&steps, StepType::SeniorHoss);
        let admin = active_id(&steps, StepType::SeniorAdmin);

        assert!(authorize_nomination(&def, &steps, hoss, &teacher, "deputy", true).is_ok());
        assert_matches!(
            authorize_nomination(&def, &steps, hoss, &teacher, "deputy", false),
            Err(CoreError::PermissionDenied(_))
        );
        assert_matches!(
            authorize_nomination(&def, &steps, hoss, &teacher, "stranger", true),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            authorize_nomination(&def, &steps, admin, &teacher, "admin1", true),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn next_step_respects_prerequisites_and_nominee() {
        let (def, mut steps) = fresh_senior();
        let first = next_step(&def, &steps).unwrap();
        assert_eq!(first.step_type, StepType::SeniorRa);
        assert_eq!(approvers_for_step(&def, first), vec!["ra_officer".to_string()]);

        let ra = active_id(&steps, StepType::SeniorRa);
        let admin = active_id(&steps, StepType::SeniorAdmin);
        set_status(&mut steps, ra, ApprovalStatus::Approved);
        set_status(&mut steps, admin, ApprovalStatus::Approved);

        let hoss = active_id(&steps, StepType::SeniorHoss);
        steps.iter_mut().find(|s| s.id == hoss).unwrap().nominated = Some("deputy".to_string());
        let next = next_step(&def, &steps).unwrap();
        assert_eq!(next.id, hoss);
        assert_eq!(approvers_for_step(&def, next), vec!["deputy".to_string()]);
        assert_eq!(current_stage(&steps), Some("Head of Senior School"));
    }

    #[test]
    fn step_views_expose_capabilities() {
        let (def, steps) = fresh_senior();
        let officer = Actor::new("ra_officer", true, &def);
        let views = step_views(&def, &steps, &officer, false);
        assert_eq!(views.len(), 3);
        assert!(views[0].can_approve);
        assert!(views[0].can_skip);
        assert!(!views[2].can_approve);
        assert!(views[2].selectable_approvers.contains(&"deputy".to_string()));
        assert!(!views[2].can_nominate);

        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["status"], 0);
        assert_eq!(json["step_type"], "senior_ra");
    }
}
