//! Dashboard aggregation: read-only views for the UI
//!
//! Composes organization-wide and per-user views from the store,
//! catalog, analyzer, and resolver. Tolerates partial data (a
//! workflow with no blockers or an empty completion history is not an
//! error) and never mutates anything.

use crate::analyzer::{BottleneckDetector, BottleneckPolicy, DeadlineAnalyzer, StageCongestion, Urgency};
use crate::assignment::{AssignmentResolver, Workload};
use crate::catalog::StageCatalog;
use crate::notifier::InboxReader;
use crate::store::WorkflowStore;
use chrono::{DateTime, Utc};
use journey_types::{
    Notification, ProcessType, RecordId, RoleId, StageId, UserId, WorkflowId, WorkflowResult,
    WorkflowStatus,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

// ── View models ──────────────────────────────────────────────────────

/// Count of active instances sitting at one stage
#[derive(Clone, Debug, Serialize)]
pub struct StageDistributionEntry {
    pub process_type: ProcessType,
    pub stage: StageId,
    pub count: usize,
}

/// An instance close to (or past) its estimated completion
#[derive(Clone, Debug, Serialize)]
pub struct UpcomingDeadline {
    pub workflow_id: WorkflowId,
    pub record_id: RecordId,
    pub stage: StageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    pub estimated_completion: DateTime<Utc>,
    pub days_remaining: i64,
}

/// Organization-wide composite view
#[derive(Clone, Debug, Serialize)]
pub struct OrgDashboard {
    pub total_workflows: usize,
    pub stage_distribution: Vec<StageDistributionEntry>,
    pub blocked_workflows: usize,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
    /// Mean creation-to-completion time; `None` until something completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_completion_time_secs: Option<i64>,
    pub bottlenecks: Vec<StageCongestion>,
}

/// The single next stage for an assigned workflow, with its checklist
#[derive(Clone, Debug, Serialize)]
pub struct NextAction {
    pub stage: StageId,
    pub stage_name: String,
    pub assigned_role: RoleId,
    /// Requirement names of the *current* stage's gate: the work to
    /// finish before this next stage is reachable
    pub gate_requirements: Vec<String>,
}

/// One row of a user's assigned-workflows list
#[derive(Clone, Debug, Serialize)]
pub struct AssignedWorkflow {
    pub workflow_id: WorkflowId,
    pub record_id: RecordId,
    pub process_type: ProcessType,
    pub current_stage: StageId,
    pub urgency: Urgency,
    pub days_remaining: i64,
    pub open_blockers: usize,
    /// `None` once the workflow sits at its terminal stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

/// Per-user composite view
#[derive(Clone, Debug, Serialize)]
pub struct UserDashboard {
    pub user_id: UserId,
    pub workload: Workload,
    pub workflows: Vec<AssignedWorkflow>,
    pub notifications: Vec<Notification>,
}

// ── Aggregator ───────────────────────────────────────────────────────

/// Read-only composition over the engine's components
pub struct DashboardAggregator {
    store: Arc<dyn WorkflowStore>,
    catalog: Arc<StageCatalog>,
    analyzer: DeadlineAnalyzer,
    resolver: AssignmentResolver,
    bottleneck_policy: BottleneckPolicy,
    inbox: Option<Arc<dyn InboxReader>>,
}

impl DashboardAggregator {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        catalog: Arc<StageCatalog>,
        analyzer: DeadlineAnalyzer,
        resolver: AssignmentResolver,
    ) -> Self {
        Self {
            store,
            catalog,
            analyzer,
            resolver,
            bottleneck_policy: BottleneckPolicy::default(),
            inbox: None,
        }
    }

    pub fn with_bottleneck_policy(mut self, policy: BottleneckPolicy) -> Self {
        self.bottleneck_policy = policy;
        self
    }

    /// Include notifications in per-user views
    pub fn with_inbox(mut self, inbox: Arc<dyn InboxReader>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// The organization-wide view
    pub async fn organization_view(&self) -> WorkflowResult<OrgDashboard> {
        let all = self.store.list_all().await?;
        let active: Vec<_> = all.iter().filter(|i| i.is_active()).collect();

        // Stage distribution, ordered by process type then stage id
        let mut distribution: BTreeMap<(ProcessType, StageId), usize> = BTreeMap::new();
        for instance in &active {
            *distribution
                .entry((instance.process_type.clone(), instance.current_stage.clone()))
                .or_default() += 1;
        }
        let stage_distribution = distribution
            .into_iter()
            .map(|((process_type, stage), count)| StageDistributionEntry {
                process_type,
                stage,
                count,
            })
            .collect();

        let blocked_workflows = active.iter().filter(|i| i.has_open_blockers()).count();

        let mut upcoming_deadlines = Vec::new();
        for instance in &active {
            if self.analyzer.urgency(instance)? == Urgency::OnTrack {
                continue;
            }
            upcoming_deadlines.push(UpcomingDeadline {
                workflow_id: instance.id.clone(),
                record_id: instance.record_id.clone(),
                stage: instance.current_stage.clone(),
                assigned_to: instance.assigned_to.clone(),
                estimated_completion: self.analyzer.estimated_completion(instance)?,
                days_remaining: self.analyzer.days_remaining(instance)?,
            });
        }
        upcoming_deadlines.sort_by_key(|d| d.days_remaining);

        let completion_times: Vec<i64> = all
            .iter()
            .filter(|i| i.status == WorkflowStatus::Completed)
            .filter_map(|i| {
                i.completed_at
                    .map(|done| done.signed_duration_since(i.created_at).num_seconds())
            })
            .collect();
        let average_completion_time_secs = if completion_times.is_empty() {
            None
        } else {
            Some(completion_times.iter().sum::<i64>() / completion_times.len() as i64)
        };

        // Congestion across every process type with active instances
        let mut process_types: Vec<ProcessType> = active
            .iter()
            .map(|i| i.process_type.clone())
            .collect();
        process_types.sort();
        process_types.dedup();

        let detector = BottleneckDetector::new(
            self.store.clone(),
            self.catalog.clone(),
            self.bottleneck_policy.clone(),
        );
        let mut bottlenecks = Vec::new();
        for process_type in &process_types {
            bottlenecks.extend(detector.bottlenecks(process_type).await?);
        }

        Ok(OrgDashboard {
            total_workflows: active.len(),
            stage_distribution,
            blocked_workflows,
            upcoming_deadlines,
            average_completion_time_secs,
            bottlenecks,
        })
    }

    /// The per-user view: workload, assigned workflows with next
    /// actions, and notifications when an inbox is attached.
    pub async fn user_view(&self, user_id: &UserId) -> WorkflowResult<UserDashboard> {
        let workload = self.resolver.workload_for(user_id).await?;
        let assigned = self.store.list_assigned_to(user_id).await?;

        let mut workflows = Vec::with_capacity(assigned.len());
        for instance in &assigned {
            let current = self
                .catalog
                .get_stage(&instance.process_type, &instance.current_stage)?;
            let next_action = self
                .catalog
                .next_stage(&instance.process_type, &instance.current_stage)?
                .map(|next| NextAction {
                    stage: next.stage_id.clone(),
                    stage_name: next.name.clone(),
                    assigned_role: next.assigned_role.clone(),
                    gate_requirements: current.requirement_names(),
                });

            workflows.push(AssignedWorkflow {
                workflow_id: instance.id.clone(),
                record_id: instance.record_id.clone(),
                process_type: instance.process_type.clone(),
                current_stage: instance.current_stage.clone(),
                urgency: self.analyzer.urgency(instance)?,
                days_remaining: self.analyzer.days_remaining(instance)?,
                open_blockers: instance.open_blockers().len(),
                next_action,
            });
        }
        // Most pressing first
        workflows.sort_by_key(|w| w.days_remaining);

        let notifications = self
            .inbox
            .as_ref()
            .map(|inbox| inbox.notifications_for(user_id))
            .unwrap_or_default();

        Ok(UserDashboard {
            user_id: user_id.clone(),
            workload,
            workflows,
            notifications,
        })
    }
}

impl std::fmt::Debug for DashboardAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardAggregator").finish_non_exhaustive()
    }
}
