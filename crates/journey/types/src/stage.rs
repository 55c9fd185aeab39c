//! Stage catalog types: the blueprint for a customer pipeline
//!
//! A ProcessDefinition is an ordered sequence of stages, each with a
//! responsible role, an estimated duration, and a Definition-of-Done:
//! the requirements that must all hold before the record advances.
//!
//! Definitions are immutable once registered. Reordering stages is a
//! data change, not a code change.

use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Identifiers ──────────────────────────────────────────────────────

/// Identifies a business process (e.g. `lead-to-quote`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessType(pub String);

impl ProcessType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a stage within a process type
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a responsible role (references the role directory)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Requirements ─────────────────────────────────────────────────────

/// A single named check in a stage's Definition-of-Done.
///
/// The name is what the caller sees when the check fails, so it is
/// written for humans ("Quote accepted by customer"), not as a code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Human-readable name, reported verbatim on gate failure
    pub name: String,
    /// The check evaluated against the record snapshot
    pub check: RequirementCheck,
}

impl Requirement {
    pub fn new(name: impl Into<String>, check: RequirementCheck) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    /// Requirement that a fact exists, whatever its value
    pub fn present(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, RequirementCheck::FieldPresent(field.into()))
    }

    /// Requirement that a fact is truthy (true, non-zero, non-empty)
    pub fn truthy(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, RequirementCheck::FieldTruthy(field.into()))
    }

    /// Requirement that a fact equals an expected value
    pub fn equals(
        name: impl Into<String>,
        field: impl Into<String>,
        expected: serde_json::Value,
    ) -> Self {
        Self::new(
            name,
            RequirementCheck::FieldEquals {
                field: field.into(),
                expected,
            },
        )
    }

    /// Requirement evaluated by a predicate registered with the validator
    pub fn predicate(name: impl Into<String>, predicate_id: impl Into<String>) -> Self {
        Self::new(name, RequirementCheck::Predicate(predicate_id.into()))
    }
}

/// The check behind a requirement, evaluated against the record snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequirementCheck {
    /// The fact exists in the snapshot
    FieldPresent(String),
    /// The fact exists and is truthy (true, non-zero number, non-empty string)
    FieldTruthy(String),
    /// The fact equals the expected value exactly
    FieldEquals {
        field: String,
        expected: serde_json::Value,
    },
    /// A custom predicate looked up by id in the validator's registry
    Predicate(String),
}

// ── Stage Definition ─────────────────────────────────────────────────

/// One stage of a customer pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Unique within the process type
    pub stage_id: StageId,
    /// Position in the pipeline; contiguous from 0 with no gaps
    pub order: u32,
    /// Human-readable name
    pub name: String,
    /// The role responsible for work at this stage
    pub assigned_role: RoleId,
    /// Definition-of-Done: all must hold before advancing past this stage
    pub requirements: Vec<Requirement>,
    /// Expected time spent in this stage, in seconds
    pub estimated_duration_secs: u64,
}

impl StageDefinition {
    pub fn new(
        stage_id: impl Into<String>,
        order: u32,
        name: impl Into<String>,
        assigned_role: impl Into<String>,
    ) -> Self {
        Self {
            stage_id: StageId::new(stage_id),
            order,
            name: name.into(),
            assigned_role: RoleId::new(assigned_role),
            requirements: Vec::new(),
            estimated_duration_secs: 0,
        }
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    /// The requirement names, in definition order
    pub fn requirement_names(&self) -> Vec<String> {
        self.requirements.iter().map(|r| r.name.clone()).collect()
    }
}

// ── Process Definition ───────────────────────────────────────────────

/// An ordered pipeline of stages for one process type.
///
/// The first stage is the sole initial state, the last the sole
/// terminal state. Transitions are single-step forward only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// The process type this pipeline defines
    pub process_type: ProcessType,
    /// Human-readable name
    pub name: String,
    /// Stages sorted by `order`
    pub stages: Vec<StageDefinition>,
}

impl ProcessDefinition {
    pub fn new(process_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            process_type: ProcessType::new(process_type),
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate structural correctness: at least one stage, unique ids,
    /// and a contiguous 0-based order with no gaps or duplicates.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.stages.is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "process '{}' has no stages",
                self.process_type
            )));
        }

        let mut seen_ids = HashSet::new();
        for stage in &self.stages {
            if !seen_ids.insert(&stage.stage_id) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "duplicate stage id '{}' in process '{}'",
                    stage.stage_id, self.process_type
                )));
            }
        }

        let mut orders: Vec<u32> = self.stages.iter().map(|s| s.order).collect();
        orders.sort_unstable();
        for (expected, order) in orders.iter().enumerate() {
            if *order != expected as u32 {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "stage order in process '{}' must be contiguous from 0; found {:?}",
                    self.process_type, orders
                )));
            }
        }

        Ok(())
    }

    /// Stages sorted by order
    pub fn ordered_stages(&self) -> Vec<&StageDefinition> {
        let mut stages: Vec<&StageDefinition> = self.stages.iter().collect();
        stages.sort_by_key(|s| s.order);
        stages
    }

    /// The sole initial stage
    pub fn first_stage(&self) -> Option<&StageDefinition> {
        self.stages.iter().min_by_key(|s| s.order)
    }

    /// The sole terminal stage
    pub fn terminal_stage(&self) -> Option<&StageDefinition> {
        self.stages.iter().max_by_key(|s| s.order)
    }

    /// Look up a stage by id
    pub fn get_stage(&self, stage_id: &StageId) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| &s.stage_id == stage_id)
    }

    /// The stage immediately after the given one, if any
    pub fn stage_after(&self, stage_id: &StageId) -> Option<&StageDefinition> {
        let current = self.get_stage(stage_id)?;
        self.stages.iter().find(|s| s.order == current.order + 1)
    }

    /// Total number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pipeline() -> ProcessDefinition {
        ProcessDefinition::new("lead-to-quote", "Lead to Quote")
            .with_stage(
                StageDefinition::new("qualification", 0, "Qualification", "sales-rep")
                    .with_requirement(Requirement::truthy(
                        "Customer contact verified",
                        "contact_verified",
                    ))
                    .with_estimated_duration(2 * 86_400),
            )
            .with_stage(
                StageDefinition::new("assessment", 1, "Needs Assessment", "sales-rep")
                    .with_estimated_duration(3 * 86_400),
            )
            .with_stage(
                StageDefinition::new("quote-generation", 2, "Quote Generation", "sales-rep")
                    .with_estimated_duration(86_400),
            )
    }

    #[test]
    fn test_validate_contiguous_order() {
        let def = make_pipeline();
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let def = ProcessDefinition::new("empty", "Empty");
        assert!(matches!(
            def.validate(),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_gap_in_order() {
        let def = ProcessDefinition::new("gapped", "Gapped")
            .with_stage(StageDefinition::new("a", 0, "A", "sales-rep"))
            .with_stage(StageDefinition::new("b", 2, "B", "sales-rep"));
        assert!(matches!(
            def.validate(),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_order() {
        let def = ProcessDefinition::new("dup-order", "Dup")
            .with_stage(StageDefinition::new("a", 0, "A", "sales-rep"))
            .with_stage(StageDefinition::new("b", 0, "B", "sales-rep"));
        assert!(matches!(
            def.validate(),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_stage_id() {
        let def = ProcessDefinition::new("dup-id", "Dup")
            .with_stage(StageDefinition::new("a", 0, "A", "sales-rep"))
            .with_stage(StageDefinition::new("a", 1, "A again", "sales-rep"));
        assert!(matches!(
            def.validate(),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_first_and_terminal_stage() {
        let def = make_pipeline();
        assert_eq!(def.first_stage().unwrap().stage_id, StageId::new("qualification"));
        assert_eq!(
            def.terminal_stage().unwrap().stage_id,
            StageId::new("quote-generation")
        );
    }

    #[test]
    fn test_stage_after() {
        let def = make_pipeline();
        let next = def.stage_after(&StageId::new("qualification")).unwrap();
        assert_eq!(next.stage_id, StageId::new("assessment"));
        assert!(def.stage_after(&StageId::new("quote-generation")).is_none());
        assert!(def.stage_after(&StageId::new("missing")).is_none());
    }

    #[test]
    fn test_ordered_stages_sorts_by_order() {
        let def = ProcessDefinition::new("shuffled", "Shuffled")
            .with_stage(StageDefinition::new("last", 1, "Last", "sales-rep"))
            .with_stage(StageDefinition::new("first", 0, "First", "sales-rep"));
        let ordered = def.ordered_stages();
        assert_eq!(ordered[0].stage_id, StageId::new("first"));
        assert_eq!(ordered[1].stage_id, StageId::new("last"));
    }

    #[test]
    fn test_requirement_constructors() {
        let present = Requirement::present("Needs documented", "needs_profile");
        assert!(matches!(present.check, RequirementCheck::FieldPresent(_)));

        let truthy = Requirement::truthy("Quote accepted", "quote_accepted");
        assert!(matches!(truthy.check, RequirementCheck::FieldTruthy(_)));

        let equals = Requirement::equals("Credit approved", "credit_status", "approved".into());
        assert!(matches!(equals.check, RequirementCheck::FieldEquals { .. }));

        let predicate = Requirement::predicate("Margin above floor", "margin-floor");
        assert!(matches!(predicate.check, RequirementCheck::Predicate(_)));
    }

    #[test]
    fn test_requirement_names_preserve_order() {
        let stage = StageDefinition::new("s", 0, "S", "sales-rep")
            .with_requirement(Requirement::present("First", "a"))
            .with_requirement(Requirement::present("Second", "b"));
        assert_eq!(stage.requirement_names(), vec!["First", "Second"]);
    }

    #[test]
    fn test_definition_round_trips_through_json() {
        let def = make_pipeline();
        let json = serde_json::to_string(&def).unwrap();
        let back: ProcessDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.process_type, def.process_type);
        assert_eq!(back.stage_count(), def.stage_count());
        assert!(back.validate().is_ok());
    }
}
