//! Deadline and bottleneck analytics
//!
//! [`DeadlineAnalyzer`] derives completion estimates and urgency from
//! the catalog's per-stage durations. [`BottleneckDetector`] surfaces
//! stages holding an abnormally large share of a process type's active
//! instances. Both are pure aggregations over current state.

use crate::catalog::StageCatalog;
use crate::store::WorkflowStore;
use chrono::{DateTime, Duration, Utc};
use journey_types::{ProcessType, RoleId, StageId, WorkflowInstance, WorkflowResult};
use serde::Serialize;
use std::sync::Arc;

const DAY_SECS: i64 = 86_400;

/// Tuning for urgency classification
#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    /// Instances within this many days of their estimate are urgent
    pub urgent_window_days: i64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            urgent_window_days: 3,
        }
    }
}

/// How close an instance is to its estimated completion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    OnTrack,
    Urgent,
    Overdue,
}

/// Derives completion estimates from catalog stage durations
#[derive(Clone, Debug)]
pub struct DeadlineAnalyzer {
    catalog: Arc<StageCatalog>,
    config: AnalyzerConfig,
}

impl DeadlineAnalyzer {
    pub fn new(catalog: Arc<StageCatalog>, config: AnalyzerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Estimated completion: the time the current stage was entered
    /// plus the estimated durations of every remaining stage through
    /// the terminal one.
    pub fn estimated_completion(
        &self,
        instance: &WorkflowInstance,
    ) -> WorkflowResult<DateTime<Utc>> {
        if let Some(completed_at) = instance.completed_at {
            return Ok(completed_at);
        }

        let current = self
            .catalog
            .get_stage(&instance.process_type, &instance.current_stage)?;
        let remaining_secs: u64 = self
            .catalog
            .stages_for(&instance.process_type)?
            .iter()
            .filter(|stage| stage.order >= current.order)
            .map(|stage| stage.estimated_duration_secs)
            .sum();

        Ok(instance.entered_current_stage_at + Duration::seconds(remaining_secs as i64))
    }

    /// Whole days until the estimate; negative values denote overdue.
    /// Floor semantics: eleven hours past the estimate is day -1.
    pub fn days_remaining(&self, instance: &WorkflowInstance) -> WorkflowResult<i64> {
        let estimate = self.estimated_completion(instance)?;
        let delta_secs = estimate.signed_duration_since(Utc::now()).num_seconds();
        Ok(delta_secs.div_euclid(DAY_SECS))
    }

    pub fn urgency(&self, instance: &WorkflowInstance) -> WorkflowResult<Urgency> {
        let days = self.days_remaining(instance)?;
        Ok(if days < 0 {
            Urgency::Overdue
        } else if days <= self.config.urgent_window_days {
            Urgency::Urgent
        } else {
            Urgency::OnTrack
        })
    }
}

// ── Bottlenecks ──────────────────────────────────────────────────────

/// Thresholds for flagging stage congestion.
///
/// A stage is flagged when it holds at least `min_count` instances and
/// either ranks in the top `top_n` stages by count or exceeds
/// `average_multiplier` times the average population of the other
/// stages in the pipeline.
#[derive(Clone, Debug)]
pub struct BottleneckPolicy {
    pub top_n: usize,
    pub average_multiplier: f64,
    pub min_count: usize,
}

impl Default for BottleneckPolicy {
    fn default() -> Self {
        Self {
            top_n: 3,
            average_multiplier: 2.0,
            min_count: 5,
        }
    }
}

/// A congested stage surfaced to dashboards
#[derive(Clone, Debug, Serialize)]
pub struct StageCongestion {
    pub stage: StageId,
    pub stage_name: String,
    pub count: usize,
    pub assigned_role: RoleId,
}

/// Groups active instances by current stage and flags congestion
pub struct BottleneckDetector {
    store: Arc<dyn WorkflowStore>,
    catalog: Arc<StageCatalog>,
    policy: BottleneckPolicy,
}

impl BottleneckDetector {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        catalog: Arc<StageCatalog>,
        policy: BottleneckPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            policy,
        }
    }

    /// Congested stages of a process type, largest count first
    pub async fn bottlenecks(
        &self,
        process_type: &ProcessType,
    ) -> WorkflowResult<Vec<StageCongestion>> {
        let stages = self.catalog.stages_for(process_type)?;
        let active = self.store.list_active_for_process(process_type).await?;
        let total = active.len();

        let mut counts: Vec<(usize, usize)> = stages
            .iter()
            .enumerate()
            .map(|(idx, stage)| {
                let count = active
                    .iter()
                    .filter(|i| i.current_stage == stage.stage_id)
                    .count();
                (idx, count)
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let mut flagged = Vec::new();
        for (rank, (idx, count)) in counts.iter().enumerate() {
            if *count < self.policy.min_count {
                continue;
            }
            let average_elsewhere = if stages.len() > 1 {
                (total - count) as f64 / (stages.len() - 1) as f64
            } else {
                0.0
            };
            let in_top_n = rank < self.policy.top_n;
            let above_average = *count as f64 > average_elsewhere * self.policy.average_multiplier;
            if in_top_n || above_average {
                let stage = stages[*idx];
                flagged.push(StageCongestion {
                    stage: stage.stage_id.clone(),
                    stage_name: stage.name.clone(),
                    count: *count,
                    assigned_role: stage.assigned_role.clone(),
                });
            }
        }

        Ok(flagged)
    }
}
