//! Journey workflow engine
//!
//! Drives customer records through stage-gated pipelines. A record may
//! only advance one stage at a time, and only after its current
//! stage's Definition-of-Done passes the gate. On every successful
//! advance the engine reassigns ownership to the next stage's
//! responsible role, records a milestone, and emits events that fan
//! out into user notifications off the critical path.
//!
//! # Architecture
//!
//! The [`WorkflowEngine`] composes specialized components:
//!
//! - [`StageCatalog`]: the single source of truth for stage ordering
//! - [`GateValidator`]: pure Definition-of-Done evaluation
//! - [`WorkflowStore`]: persistence seam with an in-memory reference
//!   implementation
//! - [`AssignmentResolver`]: least-loaded role-based ownership
//! - [`DeadlineAnalyzer`] / [`BottleneckDetector`]: completion
//!   estimates and stage congestion
//! - [`NotificationEmitter`]: asynchronous fan-out with bounded retry
//! - [`DashboardAggregator`]: read-only organization and per-user views
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use journey_engine::{
//!     InMemoryInbox, InMemoryWorkflowStore, NotificationEmitter, RetryPolicy, RoleDirectory,
//!     StageCatalog, WorkflowEngine,
//! };
//! use journey_types::{ProcessType, RecordId, RecordSnapshot, StageId, UserProfile};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> journey_types::WorkflowResult<()> {
//! let directory = Arc::new(RoleDirectory::new());
//! directory.register_user(UserProfile::new("dana", "Dana Reyes").with_role("sales-rep"))?;
//!
//! let inbox = Arc::new(InMemoryInbox::new());
//! let (emitter, _worker) = NotificationEmitter::spawn(inbox, RetryPolicy::default());
//!
//! let engine = WorkflowEngine::new(
//!     StageCatalog::standard(),
//!     Arc::new(InMemoryWorkflowStore::new()),
//!     directory,
//!     emitter,
//! );
//!
//! let instance = engine
//!     .create(RecordId::new("lead-1001"), ProcessType::new("lead-to-quote"))
//!     .await?;
//! assert_eq!(instance.current_stage, StageId::new("qualification"));
//!
//! // Advancing past qualification requires its Definition-of-Done
//! let snapshot = RecordSnapshot::new()
//!     .with_fact("contact_verified", true)
//!     .with_fact("needs_profile", "A3 color fleet, 4 floors")
//!     .with_fact("budget_range", "10k-20k");
//! let instance = engine
//!     .advance(&instance.id, &StageId::new("assessment"), &snapshot)
//!     .await?;
//! assert_eq!(instance.current_stage, StageId::new("assessment"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod analyzer;
pub mod assignment;
pub mod catalog;
pub mod dashboard;
pub mod engine;
pub mod gate;
pub mod notifier;
pub mod store;

// Re-export main types
pub use analyzer::{
    AnalyzerConfig, BottleneckDetector, BottleneckPolicy, DeadlineAnalyzer, StageCongestion,
    Urgency,
};
pub use assignment::{AssignmentResolver, RoleDirectory, Workload};
pub use catalog::StageCatalog;
pub use dashboard::{DashboardAggregator, OrgDashboard, UserDashboard};
pub use engine::WorkflowEngine;
pub use gate::GateValidator;
pub use notifier::{
    InMemoryInbox, InboxReader, NotificationEmitter, NotificationSink, RetryPolicy,
};
pub use store::{InMemoryWorkflowStore, WorkflowStore};
