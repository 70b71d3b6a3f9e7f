//! Approval workflow configuration.
//!
//! A [`WorkflowDefinition`] is loaded once at startup from JSON and shared
//! immutably. It describes each approval step type (who approves it, what it
//! depends on, which edits invalidate it) and the ordered step sequence for
//! each campus.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::activity::Campus;
use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Step types
// ---------------------------------------------------------------------------

pub const STEP_SENIOR_RA: &str = "senior_ra";
pub const STEP_SENIOR_ADMIN: &str = "senior_admin";
pub const STEP_SENIOR_HOSS: &str = "senior_hoss";
pub const STEP_PRIMARY_RA: &str = "primary_ra";
pub const STEP_PRIMARY_ADMIN: &str = "primary_admin";
pub const STEP_PRIMARY_HOPS: &str = "primary_hops";

/// All valid step type keys.
pub const VALID_STEP_TYPES: &[&str] = &[
    STEP_SENIOR_RA,
    STEP_SENIOR_ADMIN,
    STEP_SENIOR_HOSS,
    STEP_PRIMARY_RA,
    STEP_PRIMARY_ADMIN,
    STEP_PRIMARY_HOPS,
];

/// Kind of approval step. Stored as its snake_case key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Senior school risk assessment review.
    SeniorRa,
    /// Senior school administration check.
    SeniorAdmin,
    /// Head of senior school sign-off.
    SeniorHoss,
    /// Primary school risk assessment review.
    PrimaryRa,
    /// Primary school administration check.
    PrimaryAdmin,
    /// Head of primary school sign-off.
    PrimaryHops,
}

impl StepType {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            STEP_SENIOR_RA => Ok(Self::SeniorRa),
            STEP_SENIOR_ADMIN => Ok(Self::SeniorAdmin),
            STEP_SENIOR_HOSS => Ok(Self::SeniorHoss),
            STEP_PRIMARY_RA => Ok(Self::PrimaryRa),
            STEP_PRIMARY_ADMIN => Ok(Self::PrimaryAdmin),
            STEP_PRIMARY_HOPS => Ok(Self::PrimaryHops),
            _ => Err(CoreError::Validation(format!(
                "Invalid step type '{s}'. Must be one of: {}",
                VALID_STEP_TYPES.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeniorRa => STEP_SENIOR_RA,
            Self::SeniorAdmin => STEP_SENIOR_ADMIN,
            Self::SeniorHoss => STEP_SENIOR_HOSS,
            Self::PrimaryRa => STEP_PRIMARY_RA,
            Self::PrimaryAdmin => STEP_PRIMARY_ADMIN,
            Self::PrimaryHops => STEP_PRIMARY_HOPS,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration structs
// ---------------------------------------------------------------------------

/// A person allowed to action a step type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub username: String,
    /// Overrides the directory email address for this approver.
    #[serde(default)]
    pub email: Option<String>,
    /// When false the approver only receives "action required" mail.
    #[serde(default = "default_true")]
    pub notify: bool,
}

fn default_true() -> bool {
    true
}

/// Static description of one approval step type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub step_type: StepType,
    /// User-facing stage name, copied onto each step row as its description.
    pub name: String,
    /// Activity fields whose edit forces re-approval of this step.
    #[serde(default)]
    pub invalidated_on_edit: BTreeSet<String>,
    #[serde(default)]
    pub approvers: Vec<Approver>,
    /// Step types that must be approved (or skipped) first.
    #[serde(default)]
    pub prerequisites: Vec<StepType>,
    #[serde(default)]
    pub skippable: bool,
    /// Whether a specific approver can be nominated for this step.
    #[serde(default)]
    pub selectable: bool,
}

/// Exempts activities created before a cutover from a step added later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyExemption {
    pub step: StepType,
    /// Activities created strictly before this instant skip `step`.
    pub created_before: Timestamp,
}

/// On-disk form of the workflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub steps: Vec<StepDefinition>,
    pub campuses: CampusSequences,
    #[serde(default)]
    pub legacy_exemptions: Vec<LegacyExemption>,
}

/// Ordered step sequence per campus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampusSequences {
    pub primary: Vec<StepType>,
    pub senior: Vec<StepType>,
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// Validated, immutable workflow configuration.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    steps: BTreeMap<StepType, StepDefinition>,
    primary: Vec<StepType>,
    senior: Vec<StepType>,
    legacy_exemptions: Vec<LegacyExemption>,
}

impl WorkflowDefinition {
    /// Parse and validate a JSON workflow configuration.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: WorkflowConfig = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid workflow configuration: {e}")))?;
        Self::from_config(config)
    }

    /// Build a definition from an already-parsed configuration.
    pub fn from_config(config: WorkflowConfig) -> Result<Self, CoreError> {
        let mut steps = BTreeMap::new();
        for step in config.steps {
            let key = step.step_type;
            if steps.insert(key, step).is_some() {
                return Err(CoreError::Validation(format!(
                    "Step type '{}' is defined more than once",
                    key.as_str()
                )));
            }
        }

        let definition = Self {
            steps,
            primary: config.campuses.primary,
            senior: config.campuses.senior,
            legacy_exemptions: config.legacy_exemptions,
        };
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), CoreError> {
        for campus in [Campus::Primary, Campus::Senior] {
            let sequence = self.steps_for_campus(campus);
            let unique: BTreeSet<_> = sequence.iter().collect();
            if unique.len() != sequence.len() {
                return Err(CoreError::Validation(format!(
                    "Campus '{}' lists a step type twice",
                    campus.as_str()
                )));
            }
            for step in sequence {
                if !self.steps.contains_key(step) {
                    return Err(CoreError::Validation(format!(
                        "Campus '{}' refers to undefined step type '{}'",
                        campus.as_str(),
                        step.as_str()
                    )));
                }
            }
        }

        for def in self.steps.values() {
            for prerequisite in &def.prerequisites {
                if !self.steps.contains_key(prerequisite) {
                    return Err(CoreError::Validation(format!(
                        "Step type '{}' has undefined prerequisite '{}'",
                        def.step_type.as_str(),
                        prerequisite.as_str()
                    )));
                }
            }
            if self.transitive_prerequisites(def.step_type).contains(&def.step_type) {
                return Err(CoreError::Validation(format!(
                    "Step type '{}' depends on itself",
                    def.step_type.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Ordered step types configured for a campus.
    pub fn steps_for_campus(&self, campus: Campus) -> &[StepType] {
        match campus {
            Campus::Primary => &self.primary,
            Campus::Senior => &self.senior,
        }
    }

    /// Definition of a step type, if configured.
    pub fn definition(&self, step: StepType) -> Option<&StepDefinition> {
        self.steps.get(&step)
    }

    /// Definition of a step type, or an internal error if missing.
    pub fn require_definition(&self, step: StepType) -> Result<&StepDefinition, CoreError> {
        self.definition(step).ok_or_else(|| {
            CoreError::Internal(format!("Step type '{}' is not configured", step.as_str()))
        })
    }

    /// Step types required for an activity on `campus` created at
    /// `created_at`, in sequence order, after legacy exemptions.
    pub fn required_steps(&self, campus: Campus, created_at: Timestamp) -> Vec<StepType> {
        self.steps_for_campus(campus)
            .iter()
            .copied()
            .filter(|step| !self.is_exempt(*step, created_at))
            .collect()
    }

    fn is_exempt(&self, step: StepType, created_at: Timestamp) -> bool {
        self.legacy_exemptions
            .iter()
            .any(|rule| rule.step == step && created_at < rule.created_before)
    }

    /// 1-based position of a step type within the campus sequence.
    pub fn sequence_of(&self, campus: Campus, step: StepType) -> Option<i32> {
        self.steps_for_campus(campus)
            .iter()
            .position(|s| *s == step)
            .map(|i| i as i32 + 1)
    }

    /// Every step type the user can action.
    pub fn approver_types_for(&self, username: &str) -> BTreeSet<StepType> {
        self.steps
            .values()
            .filter(|def| def.approvers.iter().any(|a| a.username == username))
            .map(|def| def.step_type)
            .collect()
    }

    /// Roster entry for `username` on a step type.
    pub fn approver(&self, step: StepType, username: &str) -> Option<&Approver> {
        self.definition(step)?
            .approvers
            .iter()
            .find(|a| a.username == username)
    }

    /// Roster entry for `username` on any step type.
    pub fn find_approver(&self, username: &str) -> Option<&Approver> {
        self.steps
            .values()
            .flat_map(|def| def.approvers.iter())
            .find(|a| a.username == username)
    }

    /// All step types that `step` depends on, directly or indirectly.
    pub fn transitive_prerequisites(&self, step: StepType) -> BTreeSet<StepType> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<StepType> = self
            .definition(step)
            .map(|d| d.prerequisites.clone())
            .unwrap_or_default();

        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                if let Some(def) = self.definition(next) {
                    stack.extend(def.prerequisites.iter().copied());
                }
            }
        }
        seen
    }

    /// Step types invalidated by editing `changed` fields, including steps
    /// downstream of an invalidated prerequisite.
    pub fn invalidated_by(&self, changed: &BTreeSet<String>) -> BTreeSet<StepType> {
        let direct: BTreeSet<StepType> = self
            .steps
            .values()
            .filter(|def| !def.invalidated_on_edit.is_disjoint(changed))
            .map(|def| def.step_type)
            .collect();

        if direct.is_empty() {
            return direct;
        }

        let mut all = direct.clone();
        for def in self.steps.values() {
            if !self.transitive_prerequisites(def.step_type).is_disjoint(&direct) {
                all.insert(def.step_type);
            }
        }
        all
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
