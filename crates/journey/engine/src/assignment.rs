//! Task assignment: ownership always tracks the responsible role
//!
//! On every successful advance the engine asks the resolver for an
//! owner: the least-loaded active holder of the new stage's role,
//! ties broken by earliest last assignment (round-robin fallback).
//! The load count races benignly with concurrent assignment: a
//! momentarily stale count costs nothing but a slightly uneven pick.

use crate::analyzer::{DeadlineAnalyzer, Urgency};
use crate::store::WorkflowStore;
use chrono::{DateTime, Utc};
use journey_types::{
    RoleId, RoleInfo, StageDefinition, UserId, UserProfile, WorkflowError, WorkflowResult,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// ── Role directory ───────────────────────────────────────────────────

/// Roster of roles and users used for assignment decisions
#[derive(Default)]
pub struct RoleDirectory {
    roles: RwLock<HashMap<RoleId, RoleInfo>>,
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_role(&self, role: RoleInfo) -> WorkflowResult<()> {
        self.roles
            .write()
            .map_err(|_| WorkflowError::Store("roles lock poisoned".into()))?
            .insert(role.role_id.clone(), role);
        Ok(())
    }

    pub fn register_user(&self, user: UserProfile) -> WorkflowResult<()> {
        self.users
            .write()
            .map_err(|_| WorkflowError::Store("users lock poisoned".into()))?
            .insert(user.user_id.clone(), user);
        Ok(())
    }

    pub fn get_role(&self, role_id: &RoleId) -> WorkflowResult<Option<RoleInfo>> {
        Ok(self
            .roles
            .read()
            .map_err(|_| WorkflowError::Store("roles lock poisoned".into()))?
            .get(role_id)
            .cloned())
    }

    pub fn get_user(&self, user_id: &UserId) -> WorkflowResult<Option<UserProfile>> {
        Ok(self
            .users
            .read()
            .map_err(|_| WorkflowError::Store("users lock poisoned".into()))?
            .get(user_id)
            .cloned())
    }

    /// Active users holding the given role
    pub fn active_holders(&self, role_id: &RoleId) -> WorkflowResult<Vec<UserProfile>> {
        Ok(self
            .users
            .read()
            .map_err(|_| WorkflowError::Store("users lock poisoned".into()))?
            .values()
            .filter(|u| u.active && u.holds_role(role_id))
            .cloned()
            .collect())
    }

    /// Record that a user just received an assignment
    pub fn touch_assignment(&self, user_id: &UserId, at: DateTime<Utc>) -> WorkflowResult<()> {
        if let Some(user) = self
            .users
            .write()
            .map_err(|_| WorkflowError::Store("users lock poisoned".into()))?
            .get_mut(user_id)
        {
            user.last_assigned_at = Some(at);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoleDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleDirectory").finish_non_exhaustive()
    }
}

// ── Workload ─────────────────────────────────────────────────────────

/// Per-user workload summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Workload {
    /// Active workflows assigned to the user
    pub total: usize,
    /// Past their estimated completion
    pub overdue: usize,
    /// Inside the urgency window but not overdue
    pub urgent: usize,
    /// Carrying at least one open blocker
    pub blocked: usize,
}

// ── Resolver ─────────────────────────────────────────────────────────

/// Picks owners for stages and aggregates per-user workload
#[derive(Clone)]
pub struct AssignmentResolver {
    directory: Arc<RoleDirectory>,
    store: Arc<dyn WorkflowStore>,
    analyzer: DeadlineAnalyzer,
}

impl AssignmentResolver {
    pub fn new(
        directory: Arc<RoleDirectory>,
        store: Arc<dyn WorkflowStore>,
        analyzer: DeadlineAnalyzer,
    ) -> Self {
        Self {
            directory,
            store,
            analyzer,
        }
    }

    pub fn directory(&self) -> &Arc<RoleDirectory> {
        &self.directory
    }

    /// The least-loaded active holder of the stage's role; ties broken
    /// by earliest last assignment, then user id for determinism.
    pub async fn resolve_owner(&self, stage: &StageDefinition) -> WorkflowResult<UserId> {
        let holders = self.directory.active_holders(&stage.assigned_role)?;
        if holders.is_empty() {
            return Err(WorkflowError::NoEligibleAssignee(
                stage.assigned_role.clone(),
            ));
        }

        let active = self.store.list_active().await?;
        let mut load: HashMap<&UserId, usize> = HashMap::new();
        for instance in &active {
            if let Some(owner) = &instance.assigned_to {
                *load.entry(owner).or_default() += 1;
            }
        }

        let chosen = holders
            .iter()
            .min_by_key(|user| {
                (
                    load.get(&user.user_id).copied().unwrap_or(0),
                    user.last_assigned_at,
                    user.user_id.clone(),
                )
            })
            .map(|user| user.user_id.clone())
            // holders is non-empty, checked above
            .ok_or_else(|| WorkflowError::NoEligibleAssignee(stage.assigned_role.clone()))?;

        self.directory.touch_assignment(&chosen, Utc::now())?;
        tracing::debug!(
            user_id = %chosen,
            role = %stage.assigned_role,
            stage = %stage.stage_id,
            "owner resolved"
        );
        Ok(chosen)
    }

    /// Workload summary over the user's active assigned instances
    pub async fn workload_for(&self, user_id: &UserId) -> WorkflowResult<Workload> {
        let assigned = self.store.list_assigned_to(user_id).await?;
        let mut workload = Workload {
            total: assigned.len(),
            ..Workload::default()
        };

        for instance in &assigned {
            match self.analyzer.urgency(instance)? {
                Urgency::Overdue => workload.overdue += 1,
                Urgency::Urgent => workload.urgent += 1,
                Urgency::OnTrack => {}
            }
            if instance.has_open_blockers() {
                workload.blocked += 1;
            }
        }

        Ok(workload)
    }
}

impl std::fmt::Debug for AssignmentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerConfig;
    use crate::catalog::StageCatalog;
    use crate::store::InMemoryWorkflowStore;
    use chrono::Duration;
    use journey_types::{
        BlockerSeverity, ProcessDefinition, ProcessType, RecordId, Requirement, StageId,
        WorkflowInstance,
    };

    fn make_resolver(store: Arc<InMemoryWorkflowStore>) -> AssignmentResolver {
        let catalog = Arc::new(StageCatalog::standard());
        let directory = Arc::new(RoleDirectory::new());
        let analyzer = DeadlineAnalyzer::new(catalog, AnalyzerConfig::default());
        AssignmentResolver::new(directory, store, analyzer)
    }

    fn sales_stage() -> StageDefinition {
        StageDefinition::new("qualification", 0, "Qualification", "sales-rep")
    }

    fn make_assigned(process: &str, stage: &str, record: &str, user: &str) -> WorkflowInstance {
        let mut instance = WorkflowInstance::new(
            RecordId::new(record),
            ProcessType::new(process),
            StageId::new(stage),
        );
        instance.assign_to(UserId::new(user));
        instance
    }

    #[tokio::test]
    async fn test_resolve_requires_an_active_holder() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);

        let result = resolver.resolve_owner(&sales_stage()).await;
        assert!(matches!(result, Err(WorkflowError::NoEligibleAssignee(_))));
    }

    #[tokio::test]
    async fn test_inactive_users_are_skipped() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);
        resolver
            .directory()
            .register_user(UserProfile::new("dana", "Dana").with_role("sales-rep").inactive())
            .unwrap();

        let result = resolver.resolve_owner(&sales_stage()).await;
        assert!(matches!(result, Err(WorkflowError::NoEligibleAssignee(_))));
    }

    #[tokio::test]
    async fn test_least_loaded_wins() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store.clone());
        for (id, name) in [("dana", "Dana"), ("sam", "Sam")] {
            resolver
                .directory()
                .register_user(UserProfile::new(id, name).with_role("sales-rep"))
                .unwrap();
        }

        // Dana already owns two active workflows, Sam none
        store
            .insert(make_assigned("lead-to-quote", "qualification", "r-1", "dana"))
            .await
            .unwrap();
        store
            .insert(make_assigned("lead-to-quote", "qualification", "r-2", "dana"))
            .await
            .unwrap();

        let owner = resolver.resolve_owner(&sales_stage()).await.unwrap();
        assert_eq!(owner, UserId::new("sam"));
    }

    #[tokio::test]
    async fn test_tie_breaks_by_earliest_last_assignment() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);
        let directory = resolver.directory();

        let mut dana = UserProfile::new("dana", "Dana").with_role("sales-rep");
        dana.last_assigned_at = Some(Utc::now());
        directory.register_user(dana).unwrap();

        let mut sam = UserProfile::new("sam", "Sam").with_role("sales-rep");
        sam.last_assigned_at = Some(Utc::now() - Duration::hours(4));
        directory.register_user(sam).unwrap();

        // Equal load; Sam was assigned longer ago
        let owner = resolver.resolve_owner(&sales_stage()).await.unwrap();
        assert_eq!(owner, UserId::new("sam"));
    }

    #[tokio::test]
    async fn test_never_assigned_user_wins_tie() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);
        let directory = resolver.directory();

        let mut dana = UserProfile::new("dana", "Dana").with_role("sales-rep");
        dana.last_assigned_at = Some(Utc::now() - Duration::days(30));
        directory.register_user(dana).unwrap();
        directory
            .register_user(UserProfile::new("sam", "Sam").with_role("sales-rep"))
            .unwrap();

        // None sorts before Some: the fresh hire gets the work
        let owner = resolver.resolve_owner(&sales_stage()).await.unwrap();
        assert_eq!(owner, UserId::new("sam"));
    }

    #[tokio::test]
    async fn test_resolution_stamps_last_assignment() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);
        resolver
            .directory()
            .register_user(UserProfile::new("dana", "Dana").with_role("sales-rep"))
            .unwrap();

        resolver.resolve_owner(&sales_stage()).await.unwrap();
        let dana = resolver
            .directory()
            .get_user(&UserId::new("dana"))
            .unwrap()
            .unwrap();
        assert!(dana.last_assigned_at.is_some());
    }

    #[tokio::test]
    async fn test_workload_scenario() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let catalog = {
            let mut catalog = StageCatalog::standard();
            // A zero-slack pipeline whose instances are overdue on arrival
            catalog
                .register(
                    ProcessDefinition::new("rush", "Rush").with_stage(
                        StageDefinition::new("only", 0, "Only", "sales-rep")
                            .with_requirement(Requirement::truthy("Done", "done"))
                            .with_estimated_duration(1),
                    ),
                )
                .unwrap();
            Arc::new(catalog)
        };
        let directory = Arc::new(RoleDirectory::new());
        let analyzer = DeadlineAnalyzer::new(catalog, AnalyzerConfig::default());
        let resolver = AssignmentResolver::new(directory, store.clone(), analyzer);

        // 8 on-track workflows, 2 overdue, 1 of the 8 blocked
        for i in 0..8 {
            let mut instance = make_assigned(
                "proposal-to-contract",
                "negotiation",
                &format!("r-{i}"),
                "dana",
            );
            if i == 0 {
                instance.add_blocker("Waiting on customer legal", BlockerSeverity::Medium);
            }
            store.insert(instance).await.unwrap();
        }
        for i in 8..10 {
            let mut instance = make_assigned("rush", "only", &format!("r-{i}"), "dana");
            instance.entered_current_stage_at = Utc::now() - Duration::days(3);
            store.insert(instance).await.unwrap();
        }

        let workload = resolver.workload_for(&UserId::new("dana")).await.unwrap();
        assert_eq!(workload.total, 10);
        assert_eq!(workload.overdue, 2);
        assert_eq!(workload.blocked, 1);
        assert_eq!(workload.urgent, 0);
    }

    #[tokio::test]
    async fn test_workload_for_idle_user_is_empty() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let resolver = make_resolver(store);
        let workload = resolver
            .workload_for(&UserId::new("nobody"))
            .await
            .unwrap();
        assert_eq!(workload, Workload::default());
    }
}
