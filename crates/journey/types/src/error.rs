//! Error taxonomy for the workflow engine
//!
//! Three families, surfaced through [`ErrorKind`] so a host service can
//! map them onto its transport: validation errors (recoverable by the
//! caller completing the missing work), state errors (caller logic
//! errors, never retried automatically), and infrastructure errors
//! (transient backend faults).

use crate::instance::{BlockerId, RecordId, WorkflowId};
use crate::notification::NotificationId;
use crate::stage::{ProcessType, RoleId, StageId};
use thiserror::Error;

/// Result type used across the workflow engine
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors produced by the workflow engine
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The process type is not registered in the stage catalog
    #[error("unknown process type '{0}'")]
    UnknownProcessType(ProcessType),

    /// The stage is not part of the given process type
    #[error("unknown stage '{stage}' in process type '{process_type}'")]
    UnknownStage {
        process_type: ProcessType,
        stage: StageId,
    },

    /// An active workflow already exists for this record and process type
    #[error("record '{record_id}' already has an active '{process_type}' workflow")]
    DuplicateWorkflow {
        record_id: RecordId,
        process_type: ProcessType,
    },

    /// The requested target is not the immediate next stage
    #[error("invalid transition from '{from}' to '{to}': stages advance one step at a time")]
    InvalidTransition { from: StageId, to: StageId },

    /// The current stage's definition-of-done is not satisfied.
    ///
    /// Carries every unmet requirement name, in definition order, so the
    /// caller can present the complete checklist in one round trip.
    #[error("definition of done not satisfied: {}", .0.join("; "))]
    GateNotSatisfied(Vec<String>),

    /// The workflow reached its terminal stage; no further advances
    #[error("workflow is complete; no further advancement is possible")]
    WorkflowComplete,

    /// The workflow was explicitly cancelled
    #[error("workflow has been cancelled")]
    WorkflowCancelled,

    /// No workflow exists with the given id
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(WorkflowId),

    /// The blocker does not exist or was already resolved
    #[error("blocker '{0}' not found or already resolved")]
    BlockerNotFound(BlockerId),

    /// The notification does not exist in the target inbox
    #[error("notification '{0}' not found")]
    NotificationNotFound(NotificationId),

    /// No active user holds the role required by the stage
    #[error("no active user holds role '{0}'")]
    NoEligibleAssignee(RoleId),

    /// A process definition failed structural validation
    #[error("invalid process definition: {0}")]
    InvalidDefinition(String),

    /// The backing store failed
    #[error("store error: {0}")]
    Store(String),
}

/// The three error families of the engine contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable by the caller completing the missing work
    Validation,
    /// Caller logic error; reported with a specific code, not retried
    State,
    /// Transient backend fault; retry with backoff or surface as 5xx
    Infrastructure,
}

impl WorkflowError {
    /// Classify this error for transport mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GateNotSatisfied(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Infrastructure,
            _ => ErrorKind::State,
        }
    }
}
