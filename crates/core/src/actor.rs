//! The acting user, passed explicitly into every workflow operation.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::activity::ActivityFields;
use crate::workflow::{StepType, WorkflowDefinition};

/// Identity and capabilities of the user performing an operation.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub username: String,
    pub is_staff: bool,
    /// Step types this user may approve or skip.
    pub approver_types: BTreeSet<StepType>,
}

impl Actor {
    /// Resolve an actor's approver types from the workflow rosters.
    pub fn new(username: impl Into<String>, is_staff: bool, definition: &WorkflowDefinition) -> Self {
        let username = username.into();
        let approver_types = definition.approver_types_for(&username);
        Self {
            username,
            is_staff,
            approver_types,
        }
    }

    pub fn can_action(&self, step: StepType) -> bool {
        self.approver_types.contains(&step)
    }

    pub fn is_approver(&self) -> bool {
        !self.approver_types.is_empty()
    }

    /// Whether the user approves any step of the campus sequence.
    pub fn approves_campus(&self, definition: &WorkflowDefinition, fields: &ActivityFields) -> bool {
        definition
            .steps_for_campus(fields.campus)
            .iter()
            .any(|step| self.can_action(*step))
    }

    /// Creator, staff in charge, planning staff, or an approver of the
    /// activity's campus sequence.
    pub fn can_edit(&self, definition: &WorkflowDefinition, owner: &str, fields: &ActivityFields) -> bool {
        self.username == owner
            || self.username == fields.staff_in_charge
            || fields.planning_staff.contains(&self.username)
            || self.approves_campus(definition, fields)
    }

    /// Creator, staff in charge, or an approver of the campus sequence.
    pub fn can_delete(&self, definition: &WorkflowDefinition, owner: &str, fields: &ActivityFields) -> bool {
        self.username == owner
            || self.username == fields.staff_in_charge
            || self.approves_campus(definition, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::sample_fields;
    use crate::activity::Campus;
    use crate::workflow::tests::sample_definition;

    #[test]
    fn actor_picks_up_roster_types() {
        let def = sample_definition();
        let actor = Actor::new("hoss", true, &def);
        assert!(actor.can_action(StepType::SeniorHoss));
        assert!(!actor.can_action(StepType::SeniorRa));
        assert!(actor.is_approver());

        let teacher = Actor::new("teacher", true, &def);
        assert!(!teacher.is_approver());
    }

    #[test]
    fn editors_are_staff_or_campus_approvers() {
        let def = sample_definition();
        let fields = sample_fields();

        assert!(Actor::new("owner", true, &def).can_edit(&def, "owner", &fields));
        assert!(Actor::new("planner", true, &def).can_edit(&def, "owner", &fields));
        assert!(Actor::new("hoss", true, &def).can_edit(&def, "owner", &fields));
        assert!(!Actor::new("aide", true, &def).can_edit(&def, "owner", &fields));
        assert!(!Actor::new("hops", true, &def).can_edit(&def, "owner", &fields));

        let mut primary = fields.clone();
        primary.campus = Campus::Primary;
        assert!(Actor::new("hops", true, &def).can_edit(&def, "owner", &primary));
    }

    #[test]
    fn planners_cannot_delete() {
        let def = sample_definition();
        let fields = sample_fields();
        assert!(!Actor::new("planner", true, &def).can_delete(&def, "owner", &fields));
        assert!(Actor::new("teacher", true, &def).can_delete(&def, "owner", &fields));
        assert!(Actor::new("admin1", true, &def).can_delete(&def, "owner", &fields));
    }
}
