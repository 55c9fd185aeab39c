//! Stage catalog: the single source of truth for stage ordering
//!
//! Every pipeline a workflow can follow is registered here as data.
//! Reordering or renaming stages is a catalog change; nothing else in
//! the engine hard-codes stage ids. Lookups are read-only.

use journey_types::{
    ProcessDefinition, ProcessType, Requirement, StageDefinition, StageId, WorkflowError,
    WorkflowResult,
};
use std::collections::HashMap;

const DAY_SECS: u64 = 86_400;

/// Registry of process definitions, keyed by process type
#[derive(Clone, Debug, Default)]
pub struct StageCatalog {
    processes: HashMap<ProcessType, ProcessDefinition>,
}

impl StageCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The copier-dealer customer journey: five pipelines covering
    /// lead → quote → proposal → contract → installation → maintenance.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for definition in standard_pipelines() {
            // Standard definitions are validated in tests; registration
            // cannot fail here outside of programmer error.
            if let Err(err) = catalog.register(definition) {
                tracing::error!(error = %err, "invalid built-in pipeline");
            }
        }
        catalog
    }

    /// Register a process definition after structural validation
    pub fn register(&mut self, definition: ProcessDefinition) -> WorkflowResult<()> {
        definition.validate()?;
        tracing::info!(
            process_type = %definition.process_type,
            stages = definition.stage_count(),
            "process definition registered"
        );
        self.processes
            .insert(definition.process_type.clone(), definition);
        Ok(())
    }

    /// All registered process types
    pub fn process_types(&self) -> Vec<&ProcessType> {
        self.processes.keys().collect()
    }

    pub fn contains(&self, process_type: &ProcessType) -> bool {
        self.processes.contains_key(process_type)
    }

    /// The full definition for a process type
    pub fn definition(&self, process_type: &ProcessType) -> WorkflowResult<&ProcessDefinition> {
        self.processes
            .get(process_type)
            .ok_or_else(|| WorkflowError::UnknownProcessType(process_type.clone()))
    }

    /// Stages of a process type, sorted by order
    pub fn stages_for(&self, process_type: &ProcessType) -> WorkflowResult<Vec<&StageDefinition>> {
        Ok(self.definition(process_type)?.ordered_stages())
    }

    /// A specific stage of a process type
    pub fn get_stage(
        &self,
        process_type: &ProcessType,
        stage_id: &StageId,
    ) -> WorkflowResult<&StageDefinition> {
        self.definition(process_type)?
            .get_stage(stage_id)
            .ok_or_else(|| WorkflowError::UnknownStage {
                process_type: process_type.clone(),
                stage: stage_id.clone(),
            })
    }

    /// The stage immediately after the given one; `None` at the terminal stage
    pub fn next_stage(
        &self,
        process_type: &ProcessType,
        stage_id: &StageId,
    ) -> WorkflowResult<Option<&StageDefinition>> {
        let definition = self.definition(process_type)?;
        // Distinguish "no next stage" from "unknown stage"
        if definition.get_stage(stage_id).is_none() {
            return Err(WorkflowError::UnknownStage {
                process_type: process_type.clone(),
                stage: stage_id.clone(),
            });
        }
        Ok(definition.stage_after(stage_id))
    }

    /// Whether the stage is the pipeline's terminal stage
    pub fn is_terminal(
        &self,
        process_type: &ProcessType,
        stage_id: &StageId,
    ) -> WorkflowResult<bool> {
        Ok(self.next_stage(process_type, stage_id)?.is_none())
    }

    /// The pipeline's sole initial stage
    pub fn first_stage(&self, process_type: &ProcessType) -> WorkflowResult<&StageDefinition> {
        self.definition(process_type)?
            .first_stage()
            .ok_or_else(|| WorkflowError::UnknownProcessType(process_type.clone()))
    }
}

// ── Built-in pipelines ───────────────────────────────────────────────

fn standard_pipelines() -> Vec<ProcessDefinition> {
    vec![
        ProcessDefinition::new("lead-to-quote", "Lead to Quote")
            .with_stage(
                StageDefinition::new("qualification", 0, "Qualification", "sales-rep")
                    .with_requirement(Requirement::truthy(
                        "Customer contact verified",
                        "contact_verified",
                    ))
                    .with_requirement(Requirement::present(
                        "Copier needs documented",
                        "needs_profile",
                    ))
                    .with_requirement(Requirement::present(
                        "Budget range captured",
                        "budget_range",
                    ))
                    .with_estimated_duration(2 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("assessment", 1, "Needs Assessment", "sales-rep")
                    .with_requirement(Requirement::present(
                        "Monthly print volume assessed",
                        "monthly_print_volume",
                    ))
                    .with_requirement(Requirement::present(
                        "Site requirements recorded",
                        "site_requirements",
                    ))
                    .with_estimated_duration(3 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("solution-design", 2, "Solution Design", "solution-architect")
                    .with_requirement(Requirement::present(
                        "Machine model selected",
                        "selected_model",
                    ))
                    .with_requirement(Requirement::truthy(
                        "Consumables plan drafted",
                        "consumables_plan_ready",
                    ))
                    .with_estimated_duration(4 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("quote-generation", 3, "Quote Generation", "sales-rep")
                    .with_requirement(Requirement::truthy("Pricing approved", "pricing_approved"))
                    .with_estimated_duration(DAY_SECS),
            ),
        ProcessDefinition::new("quote-to-proposal", "Quote to Proposal")
            .with_stage(
                StageDefinition::new("quote-review", 0, "Quote Review", "sales-rep")
                    .with_requirement(Requirement::truthy(
                        "Quote accepted by customer",
                        "quote_accepted",
                    ))
                    .with_estimated_duration(DAY_SECS),
            )
            .with_stage(
                StageDefinition::new(
                    "proposal-drafting",
                    1,
                    "Proposal Drafting",
                    "solution-architect",
                )
                .with_requirement(Requirement::present(
                    "Financing terms selected",
                    "financing_terms",
                ))
                .with_requirement(Requirement::present(
                    "Service level agreed",
                    "service_level",
                ))
                .with_estimated_duration(3 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("proposal-approval", 2, "Proposal Approval", "sales-manager")
                    .with_requirement(Requirement::truthy("Margin floor respected", "margin_ok"))
                    .with_requirement(Requirement::truthy(
                        "Manager sign-off recorded",
                        "manager_signoff",
                    ))
                    .with_estimated_duration(DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("proposal-delivery", 3, "Proposal Delivery", "sales-rep")
                    .with_requirement(Requirement::truthy(
                        "Proposal sent to customer",
                        "proposal_sent",
                    ))
                    .with_estimated_duration(DAY_SECS),
            ),
        ProcessDefinition::new("proposal-to-contract", "Proposal to Contract")
            .with_stage(
                StageDefinition::new("negotiation", 0, "Negotiation", "sales-rep")
                    .with_requirement(Requirement::truthy(
                        "Commercial terms agreed",
                        "terms_agreed",
                    ))
                    .with_estimated_duration(5 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("legal-review", 1, "Legal Review", "legal-counsel")
                    .with_requirement(Requirement::truthy(
                        "Contract draft reviewed",
                        "legal_review_done",
                    ))
                    .with_requirement(Requirement::truthy(
                        "Liability clauses cleared",
                        "liability_cleared",
                    ))
                    .with_estimated_duration(3 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new(
                    "contract-preparation",
                    2,
                    "Contract Preparation",
                    "legal-counsel",
                )
                .with_requirement(Requirement::present(
                    "Final contract assembled",
                    "contract_document",
                ))
                .with_estimated_duration(2 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("contract-signing", 3, "Contract Signing", "sales-manager")
                    .with_requirement(Requirement::truthy(
                        "Customer signature obtained",
                        "customer_signed",
                    ))
                    .with_estimated_duration(2 * DAY_SECS),
            ),
        ProcessDefinition::new("contract-to-installation", "Contract to Installation")
            .with_stage(
                StageDefinition::new("site-survey", 0, "Site Survey", "field-engineer")
                    .with_requirement(Requirement::truthy(
                        "Site survey completed",
                        "site_survey_done",
                    ))
                    .with_requirement(Requirement::truthy(
                        "Power and network verified",
                        "utilities_verified",
                    ))
                    .with_estimated_duration(2 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new(
                    "delivery-scheduling",
                    1,
                    "Delivery Scheduling",
                    "logistics-coordinator",
                )
                .with_requirement(Requirement::present(
                    "Delivery date confirmed",
                    "delivery_date",
                ))
                .with_estimated_duration(2 * DAY_SECS),
            )
            .with_stage(
                StageDefinition::new(
                    "machine-installation",
                    2,
                    "Machine Installation",
                    "field-engineer",
                )
                .with_requirement(Requirement::truthy(
                    "Machine installed and tested",
                    "installation_tested",
                ))
                .with_estimated_duration(DAY_SECS),
            )
            .with_stage(
                StageDefinition::new("customer-training", 3, "Customer Training", "field-engineer")
                    .with_requirement(Requirement::truthy(
                        "Operator training delivered",
                        "training_delivered",
                    ))
                    .with_estimated_duration(DAY_SECS),
            ),
        ProcessDefinition::new("installation-to-maintenance", "Installation to Maintenance")
            .with_stage(
                StageDefinition::new(
                    "maintenance-enrollment",
                    0,
                    "Maintenance Enrollment",
                    "service-coordinator",
                )
                .with_requirement(Requirement::truthy(
                    "Service contract active",
                    "service_contract_active",
                ))
                .with_estimated_duration(DAY_SECS),
            )
            .with_stage(
                StageDefinition::new(
                    "first-service-visit",
                    1,
                    "First Service Visit",
                    "field-engineer",
                )
                .with_requirement(Requirement::truthy(
                    "First service visit completed",
                    "first_visit_done",
                ))
                .with_estimated_duration(30 * DAY_SECS),
            ),
    ]
}
