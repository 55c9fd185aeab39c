//! Notifications and the engine events that produce them
//!
//! Events describe what happened (a transition, a blocker change, an
//! approaching deadline). The emitter fans each event out into
//! per-user notifications off the critical path of the operation that
//! produced it. Notifications are append-only; only the read flag
//! mutates.

use crate::instance::{Blocker, BlockerId, RecordId, UserId, WorkflowId};
use crate::stage::{ProcessType, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Events ───────────────────────────────────────────────────────────

/// Something that happened to a workflow instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WorkflowEvent {
    /// The instance passed a gate and moved forward one stage
    StageTransitioned {
        workflow_id: WorkflowId,
        record_id: RecordId,
        process_type: ProcessType,
        from: StageId,
        to: StageId,
        /// Owner after reassignment
        owner: Option<UserId>,
        /// Owner before the transition (kept informed as a watcher)
        previous_owner: Option<UserId>,
        watchers: Vec<UserId>,
        occurred_at: DateTime<Utc>,
    },

    /// An open issue was attached to the instance
    BlockerCreated {
        workflow_id: WorkflowId,
        record_id: RecordId,
        blocker: Blocker,
        owner: Option<UserId>,
        watchers: Vec<UserId>,
        occurred_at: DateTime<Utc>,
    },

    /// An open issue was resolved
    BlockerResolved {
        workflow_id: WorkflowId,
        record_id: RecordId,
        blocker_id: BlockerId,
        description: String,
        owner: Option<UserId>,
        watchers: Vec<UserId>,
        occurred_at: DateTime<Utc>,
    },

    /// The estimated completion crossed the urgency threshold
    DeadlineApproaching {
        workflow_id: WorkflowId,
        record_id: RecordId,
        stage: StageId,
        owner: Option<UserId>,
        watchers: Vec<UserId>,
        days_remaining: i64,
        estimated_completion: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    /// The workflow this event belongs to
    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            Self::StageTransitioned { workflow_id, .. }
            | Self::BlockerCreated { workflow_id, .. }
            | Self::BlockerResolved { workflow_id, .. }
            | Self::DeadlineApproaching { workflow_id, .. } => workflow_id,
        }
    }

    /// The notification kind this event produces
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::StageTransitioned { .. } => NotificationKind::StageTransition,
            Self::BlockerCreated { .. } => NotificationKind::BlockerCreated,
            Self::BlockerResolved { .. } => NotificationKind::BlockerResolved,
            Self::DeadlineApproaching { .. } => NotificationKind::DeadlineApproaching,
        }
    }
}

// ── Notifications ────────────────────────────────────────────────────

/// Unique identifier for a notification
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The category of a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StageTransition,
    BlockerCreated,
    BlockerResolved,
    DeadlineApproaching,
}

/// A message delivered to one user's inbox
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub workflow_id: WorkflowId,
    /// The user this notification is addressed to
    pub user_id: UserId,
    /// Human-readable summary
    pub message: String,
    /// Structured event data for the UI
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        workflow_id: WorkflowId,
        user_id: UserId,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            kind,
            workflow_id,
            user_id,
            message: message.into(),
            payload,
            created_at: Utc::now(),
            read: false,
            read_at: None,
        }
    }

    pub fn mark_read(&mut self) {
        if !self.read {
            self.read = true;
            self.read_at = Some(Utc::now());
        }
    }
}
