//! Workflow instances: per-record progress through a pipeline
//!
//! One instance exists per business record per process type. It tracks
//! the current stage, the completed-stage prefix, open blockers, and
//! milestones. Instances are mutated only through the engine's
//! advancement protocol, never by direct field edits.

use crate::stage::{ProcessType, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the business record (customer, lead, contract) behind an instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a user in the role directory
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a blocker
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockerId(pub String);

impl BlockerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for BlockerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Blockers ─────────────────────────────────────────────────────────

/// Severity of an open issue on a workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockerSeverity {
    Low,
    Medium,
    High,
}

/// An open issue attached to a workflow instance.
///
/// A blocker does not halt advancement by itself; it feeds dashboards
/// and workload reporting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blocker {
    pub id: BlockerId,
    pub description: String,
    pub severity: BlockerSeverity,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Blocker {
    pub fn new(description: impl Into<String>, severity: BlockerSeverity) -> Self {
        Self {
            id: BlockerId::generate(),
            description: description.into(),
            severity,
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
        }
    }
}

// ── Progress records ─────────────────────────────────────────────────

/// A stage the instance has passed through, with its completion time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletedStage {
    pub stage: StageId,
    pub completed_at: DateTime<Utc>,
}

/// A milestone event in the instance history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Milestone {
    /// Monotonically increasing within the instance
    pub sequence: u64,
    /// The stage the milestone relates to
    pub stage: StageId,
    /// Human-readable label
    pub label: String,
    pub occurred_at: DateTime<Utc>,
}

// ── Workflow status ──────────────────────────────────────────────────

/// Lifecycle status of a workflow instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Progressing through the pipeline
    #[default]
    Active,
    /// Reached the terminal stage
    Completed,
    /// Explicitly closed before the terminal stage
    Cancelled,
}

impl WorkflowStatus {
    /// Completed and cancelled instances accept no further advances
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

// ── Workflow Instance ────────────────────────────────────────────────

/// Per-record progress through one process type's pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: WorkflowId,
    pub record_id: RecordId,
    pub process_type: ProcessType,
    pub status: WorkflowStatus,
    /// Always a valid stage of `process_type`
    pub current_stage: StageId,
    /// When the instance entered `current_stage`
    pub entered_current_stage_at: DateTime<Utc>,
    /// Strict order-respecting prefix of the pipeline's stage order
    pub completed_stages: Vec<CompletedStage>,
    pub blockers: Vec<Blocker>,
    pub milestones: Vec<Milestone>,
    /// Owner; tracks the current stage's responsible role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    /// Users notified alongside the owner on transitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watchers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_reason: Option<String>,
}

impl WorkflowInstance {
    /// Create a new instance positioned at the pipeline's first stage
    pub fn new(record_id: RecordId, process_type: ProcessType, first_stage: StageId) -> Self {
        let now = Utc::now();
        let mut instance = Self {
            id: WorkflowId::generate(),
            record_id,
            process_type,
            status: WorkflowStatus::Active,
            current_stage: first_stage.clone(),
            entered_current_stage_at: now,
            completed_stages: Vec::new(),
            blockers: Vec::new(),
            milestones: Vec::new(),
            assigned_to: None,
            watchers: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_reason: None,
        };
        instance.record_milestone(first_stage, "Workflow started");
        instance
    }

    // ── Mutation (engine-only) ───────────────────────────────────────

    /// Move to the next stage: the current stage joins the completed
    /// prefix and a milestone is recorded. The caller has already
    /// verified ordering and the gate.
    pub fn advance_to(&mut self, next_stage: StageId) {
        let now = Utc::now();
        self.completed_stages.push(CompletedStage {
            stage: self.current_stage.clone(),
            completed_at: now,
        });
        self.record_milestone(
            self.current_stage.clone(),
            format!("Stage '{}' completed", self.current_stage),
        );
        self.current_stage = next_stage;
        self.entered_current_stage_at = now;
        self.updated_at = now;
    }

    /// Mark the instance complete (current stage is terminal)
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        self.record_milestone(self.current_stage.clone(), "Workflow completed");
    }

    /// Close the instance before the terminal stage
    pub fn cancel(&mut self, reason: impl Into<String>) {
        let now = Utc::now();
        self.status = WorkflowStatus::Cancelled;
        self.cancelled_reason = Some(reason.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        self.record_milestone(self.current_stage.clone(), "Workflow cancelled");
    }

    /// Attach a new open blocker and return it
    pub fn add_blocker(&mut self, description: impl Into<String>, severity: BlockerSeverity) -> Blocker {
        let blocker = Blocker::new(description, severity);
        self.blockers.push(blocker.clone());
        self.updated_at = Utc::now();
        blocker
    }

    /// Resolve an open blocker; `None` if absent or already resolved
    pub fn resolve_blocker(&mut self, blocker_id: &BlockerId) -> Option<Blocker> {
        let blocker = self
            .blockers
            .iter_mut()
            .find(|b| &b.id == blocker_id && !b.resolved)?;
        blocker.resolved = true;
        blocker.resolved_at = Some(Utc::now());
        let resolved = blocker.clone();
        self.updated_at = Utc::now();
        Some(resolved)
    }

    pub fn assign_to(&mut self, user: UserId) {
        self.assigned_to = Some(user);
        self.updated_at = Utc::now();
    }

    pub fn add_watcher(&mut self, user: UserId) {
        if !self.watchers.contains(&user) {
            self.watchers.push(user);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Open (unresolved) blockers
    pub fn open_blockers(&self) -> Vec<&Blocker> {
        self.blockers.iter().filter(|b| !b.resolved).collect()
    }

    pub fn has_open_blockers(&self) -> bool {
        self.blockers.iter().any(|b| !b.resolved)
    }

    /// Ids of the completed-stage prefix, in completion order
    pub fn completed_stage_ids(&self) -> Vec<&StageId> {
        self.completed_stages.iter().map(|c| &c.stage).collect()
    }

    /// Seconds since the instance was created
    pub fn elapsed_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.created_at)
            .num_seconds()
    }

    /// Seconds spent in the current stage
    pub fn secs_in_current_stage(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.entered_current_stage_at)
            .num_seconds()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn record_milestone(&mut self, stage: StageId, label: impl Into<String>) {
        self.milestones.push(Milestone {
            sequence: self.milestones.len() as u64,
            stage,
            label: label.into(),
            occurred_at: Utc::now(),
        });
    }
}
