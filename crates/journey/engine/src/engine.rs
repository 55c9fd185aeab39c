//! The workflow engine: gate-validated, single-step advancement
//!
//! All mutating operations on one workflow id are linearized through a
//! per-id async mutex, so two concurrent advances can never both pass
//! validation and double-increment the stage. Operations on different
//! instances run fully in parallel. Catalog and gate lookups are
//! read-only and take no lock.

use crate::analyzer::{AnalyzerConfig, DeadlineAnalyzer, Urgency};
use crate::assignment::{AssignmentResolver, RoleDirectory};
use crate::catalog::StageCatalog;
use crate::dashboard::DashboardAggregator;
use crate::gate::GateValidator;
use crate::notifier::NotificationEmitter;
use crate::store::WorkflowStore;
use chrono::Utc;
use journey_types::{
    Blocker, BlockerId, BlockerSeverity, ProcessType, RecordId, RecordSnapshot, StageId,
    ValidationReport, WorkflowError, WorkflowEvent, WorkflowId, WorkflowInstance, WorkflowResult,
    WorkflowStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Coordinates catalog, gates, store, assignment, and notifications
pub struct WorkflowEngine {
    catalog: Arc<StageCatalog>,
    store: Arc<dyn WorkflowStore>,
    validator: GateValidator,
    resolver: AssignmentResolver,
    analyzer: DeadlineAnalyzer,
    emitter: NotificationEmitter,
    /// Per-instance serialization for mutating operations
    locks: Mutex<HashMap<WorkflowId, Arc<Mutex<()>>>>,
    /// Deadline alerts already sent, keyed by (workflow, stage)
    deadline_notified: Mutex<HashSet<(WorkflowId, StageId)>>,
}

impl WorkflowEngine {
    pub fn new(
        catalog: StageCatalog,
        store: Arc<dyn WorkflowStore>,
        directory: Arc<RoleDirectory>,
        emitter: NotificationEmitter,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let analyzer = DeadlineAnalyzer::new(catalog.clone(), AnalyzerConfig::default());
        let resolver = AssignmentResolver::new(directory, store.clone(), analyzer.clone());
        Self {
            catalog,
            store,
            validator: GateValidator::new(),
            resolver,
            analyzer,
            emitter,
            locks: Mutex::new(HashMap::new()),
            deadline_notified: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the gate validator (to register custom predicates)
    pub fn with_validator(mut self, validator: GateValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Override urgency tuning
    pub fn with_analyzer_config(mut self, config: AnalyzerConfig) -> Self {
        self.analyzer = DeadlineAnalyzer::new(self.catalog.clone(), config);
        self.resolver = AssignmentResolver::new(
            self.resolver.directory().clone(),
            self.store.clone(),
            self.analyzer.clone(),
        );
        self
    }

    pub fn catalog(&self) -> &Arc<StageCatalog> {
        &self.catalog
    }

    pub fn analyzer(&self) -> &DeadlineAnalyzer {
        &self.analyzer
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /// Read-only dashboard views over this engine's store
    pub fn dashboard(&self) -> DashboardAggregator {
        DashboardAggregator::new(
            self.store.clone(),
            self.catalog.clone(),
            self.analyzer.clone(),
            self.resolver.clone(),
        )
    }

    // ── Lifecycle operations ─────────────────────────────────────────

    /// Start a workflow for a record, positioned at the pipeline's
    /// first stage with an owner resolved for that stage's role.
    pub async fn create(
        &self,
        record_id: RecordId,
        process_type: ProcessType,
    ) -> WorkflowResult<WorkflowInstance> {
        let first = self.catalog.first_stage(&process_type)?;

        let mut instance =
            WorkflowInstance::new(record_id, process_type, first.stage_id.clone());
        let owner = self.resolver.resolve_owner(first).await?;
        instance.assign_to(owner);

        // The store enforces at-most-one-active per record + process
        self.store.insert(instance.clone()).await?;

        tracing::info!(
            workflow_id = %instance.id,
            record_id = %instance.record_id,
            process_type = %instance.process_type,
            stage = %instance.current_stage,
            "workflow created"
        );
        Ok(instance)
    }

    /// Advance one step forward, past the current stage's gate.
    ///
    /// `target_stage` must be the immediate next stage in the catalog
    /// order, and every requirement of the *current* stage must hold
    /// in `snapshot`. A failed advance leaves the instance untouched
    /// and reports the complete list of unmet requirements.
    pub async fn advance(
        &self,
        workflow_id: &WorkflowId,
        target_stage: &StageId,
        snapshot: &RecordSnapshot,
    ) -> WorkflowResult<WorkflowInstance> {
        let lock = self.instance_lock(workflow_id).await;
        let _guard = lock.lock().await;

        let mut instance = self.store.get(workflow_id).await?;
        match instance.status {
            WorkflowStatus::Completed => return Err(WorkflowError::WorkflowComplete),
            WorkflowStatus::Cancelled => return Err(WorkflowError::WorkflowCancelled),
            WorkflowStatus::Active => {}
        }

        let current = self
            .catalog
            .get_stage(&instance.process_type, &instance.current_stage)?;
        let next = self
            .catalog
            .next_stage(&instance.process_type, &instance.current_stage)?
            .ok_or(WorkflowError::WorkflowComplete)?;
        if next.stage_id != *target_stage {
            return Err(WorkflowError::InvalidTransition {
                from: instance.current_stage.clone(),
                to: target_stage.clone(),
            });
        }

        let report = self.validator.validate(snapshot, &current.requirements);
        if !report.valid {
            return Err(WorkflowError::GateNotSatisfied(report.failed));
        }

        let previous_owner = instance.assigned_to.clone();
        instance.advance_to(next.stage_id.clone());

        let owner = self.resolver.resolve_owner(next).await?;
        instance.assign_to(owner);

        if self
            .catalog
            .is_terminal(&instance.process_type, &instance.current_stage)?
        {
            instance.complete();
        }

        self.store.update(instance.clone()).await?;

        self.emitter.emit(WorkflowEvent::StageTransitioned {
            workflow_id: instance.id.clone(),
            record_id: instance.record_id.clone(),
            process_type: instance.process_type.clone(),
            from: current.stage_id.clone(),
            to: instance.current_stage.clone(),
            owner: instance.assigned_to.clone(),
            previous_owner,
            watchers: instance.watchers.clone(),
            occurred_at: Utc::now(),
        });

        tracing::info!(
            workflow_id = %instance.id,
            from = %current.stage_id,
            to = %instance.current_stage,
            completed = !instance.is_active(),
            "workflow advanced"
        );
        Ok(instance)
    }

    /// Pre-flight gate check mirroring a UI "can I proceed?" request.
    /// Read-only; reports the current stage's unmet requirements.
    pub async fn check_gate(
        &self,
        workflow_id: &WorkflowId,
        snapshot: &RecordSnapshot,
    ) -> WorkflowResult<ValidationReport> {
        let instance = self.store.get(workflow_id).await?;
        let current = self
            .catalog
            .get_stage(&instance.process_type, &instance.current_stage)?;
        Ok(self.validator.validate(snapshot, &current.requirements))
    }

    /// Attach an open issue; allowed at any stage, never moves it
    pub async fn add_blocker(
        &self,
        workflow_id: &WorkflowId,
        description: impl Into<String>,
        severity: BlockerSeverity,
    ) -> WorkflowResult<Blocker> {
        let lock = self.instance_lock(workflow_id).await;
        let _guard = lock.lock().await;

        let mut instance = self.store.get(workflow_id).await?;
        let blocker = instance.add_blocker(description, severity);
        self.store.update(instance.clone()).await?;

        self.emitter.emit(WorkflowEvent::BlockerCreated {
            workflow_id: instance.id.clone(),
            record_id: instance.record_id.clone(),
            blocker: blocker.clone(),
            owner: instance.assigned_to.clone(),
            watchers: instance.watchers.clone(),
            occurred_at: Utc::now(),
        });

        tracing::info!(
            workflow_id = %instance.id,
            blocker_id = %blocker.id,
            severity = ?blocker.severity,
            "blocker added"
        );
        Ok(blocker)
    }

    /// Resolve an open blocker
    pub async fn resolve_blocker(
        &self,
        workflow_id: &WorkflowId,
        blocker_id: &BlockerId,
    ) -> WorkflowResult<Blocker> {
        let lock = self.instance_lock(workflow_id).await;
        let _guard = lock.lock().await;

        let mut instance = self.store.get(workflow_id).await?;
        let blocker = instance
            .resolve_blocker(blocker_id)
            .ok_or_else(|| WorkflowError::BlockerNotFound(blocker_id.clone()))?;
        self.store.update(instance.clone()).await?;

        self.emitter.emit(WorkflowEvent::BlockerResolved {
            workflow_id: instance.id.clone(),
            record_id: instance.record_id.clone(),
            blocker_id: blocker.id.clone(),
            description: blocker.description.clone(),
            owner: instance.assigned_to.clone(),
            watchers: instance.watchers.clone(),
            occurred_at: Utc::now(),
        });

        tracing::info!(
            workflow_id = %instance.id,
            blocker_id = %blocker.id,
            "blocker resolved"
        );
        Ok(blocker)
    }

    /// Explicitly close a workflow before its terminal stage
    pub async fn cancel(
        &self,
        workflow_id: &WorkflowId,
        reason: impl Into<String>,
    ) -> WorkflowResult<WorkflowInstance> {
        let lock = self.instance_lock(workflow_id).await;
        let _guard = lock.lock().await;

        let mut instance = self.store.get(workflow_id).await?;
        match instance.status {
            WorkflowStatus::Completed => return Err(WorkflowError::WorkflowComplete),
            WorkflowStatus::Cancelled => return Err(WorkflowError::WorkflowCancelled),
            WorkflowStatus::Active => {}
        }

        let reason = reason.into();
        instance.cancel(reason.clone());
        self.store.update(instance.clone()).await?;

        tracing::info!(workflow_id = %instance.id, %reason, "workflow cancelled");
        Ok(instance)
    }

    /// Fetch one instance
    pub async fn get(&self, workflow_id: &WorkflowId) -> WorkflowResult<WorkflowInstance> {
        self.store.get(workflow_id).await
    }

    // ── Deadline sweep ───────────────────────────────────────────────

    /// Emit a deadline alert for every active instance that is urgent
    /// or overdue and has not been alerted at its current stage yet.
    /// The host calls this on its own schedule. Returns the number of
    /// alerts emitted.
    pub async fn scan_deadlines(&self) -> WorkflowResult<usize> {
        let active = self.store.list_active().await?;
        let mut notified = self.deadline_notified.lock().await;
        let mut emitted = 0;

        for instance in active {
            if self.analyzer.urgency(&instance)? == Urgency::OnTrack {
                continue;
            }
            let key = (instance.id.clone(), instance.current_stage.clone());
            if notified.contains(&key) {
                continue;
            }

            let days_remaining = self.analyzer.days_remaining(&instance)?;
            self.emitter.emit(WorkflowEvent::DeadlineApproaching {
                workflow_id: instance.id.clone(),
                record_id: instance.record_id.clone(),
                stage: instance.current_stage.clone(),
                owner: instance.assigned_to.clone(),
                watchers: instance.watchers.clone(),
                days_remaining,
                estimated_completion: self.analyzer.estimated_completion(&instance)?,
                occurred_at: Utc::now(),
            });
            notified.insert(key);
            emitted += 1;
        }

        Ok(emitted)
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn instance_lock(&self, workflow_id: &WorkflowId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(workflow_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine").finish_non_exhaustive()
    }
}
