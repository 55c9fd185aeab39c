//! Domain types for the Journey workflow engine
//!
//! A customer record moves through an ordered pipeline of stages
//! (lead → quote → proposal → contract → installation → maintenance).
//! Each stage carries a Definition-of-Done: a named set of requirements
//! that must all hold before the record may advance.
//!
//! This crate holds the data model only. The advancement protocol,
//! gate evaluation, assignment, and analytics live in `journey-engine`.

#![deny(unsafe_code)]

pub mod error;
pub mod instance;
pub mod notification;
pub mod role;
pub mod snapshot;
pub mod stage;

pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use instance::{
    Blocker, BlockerId, BlockerSeverity, CompletedStage, Milestone, RecordId, UserId,
    WorkflowId, WorkflowInstance, WorkflowStatus,
};
pub use notification::{Notification, NotificationId, NotificationKind, WorkflowEvent};
pub use role::{RoleInfo, UserProfile};
pub use snapshot::{RecordSnapshot, ValidationReport};
pub use stage::{
    ProcessDefinition, ProcessType, Requirement, RequirementCheck, RoleId, StageDefinition,
    StageId,
};
