//! Workflow instance store: the persistence seam
//!
//! The engine talks to storage through [`WorkflowStore`] so it can be
//! tested without a database. [`InMemoryWorkflowStore`] is the
//! deterministic reference implementation; production deployments
//! should back this trait with a transactional store.

use async_trait::async_trait;
use journey_types::{
    ProcessType, RecordId, UserId, WorkflowError, WorkflowId, WorkflowInstance, WorkflowResult,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage interface for workflow instances
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new instance. Enforces at most one active workflow per
    /// record + process type pair.
    async fn insert(&self, instance: WorkflowInstance) -> WorkflowResult<()>;

    /// Get one instance by id
    async fn get(&self, id: &WorkflowId) -> WorkflowResult<WorkflowInstance>;

    /// Replace a stored instance
    async fn update(&self, instance: WorkflowInstance) -> WorkflowResult<()>;

    /// The active instance for a record + process type, if any
    async fn find_active_for_record(
        &self,
        record_id: &RecordId,
        process_type: &ProcessType,
    ) -> WorkflowResult<Option<WorkflowInstance>>;

    /// All active instances
    async fn list_active(&self) -> WorkflowResult<Vec<WorkflowInstance>>;

    /// Active instances of one process type
    async fn list_active_for_process(
        &self,
        process_type: &ProcessType,
    ) -> WorkflowResult<Vec<WorkflowInstance>>;

    /// Active instances owned by a user
    async fn list_assigned_to(&self, user_id: &UserId) -> WorkflowResult<Vec<WorkflowInstance>>;

    /// Every instance, active or closed
    async fn list_all(&self) -> WorkflowResult<Vec<WorkflowInstance>>;
}

/// In-memory reference implementation of [`WorkflowStore`]
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    instances: RwLock<HashMap<WorkflowId, WorkflowInstance>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> WorkflowResult<std::sync::RwLockReadGuard<'_, HashMap<WorkflowId, WorkflowInstance>>> {
        self.instances
            .read()
            .map_err(|_| WorkflowError::Store("instances lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> WorkflowResult<std::sync::RwLockWriteGuard<'_, HashMap<WorkflowId, WorkflowInstance>>> {
        self.instances
            .write()
            .map_err(|_| WorkflowError::Store("instances lock poisoned".into()))
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, instance: WorkflowInstance) -> WorkflowResult<()> {
        let mut guard = self.write()?;
        let duplicate = guard.values().any(|existing| {
            existing.is_active()
                && existing.record_id == instance.record_id
                && existing.process_type == instance.process_type
        });
        if duplicate {
            return Err(WorkflowError::DuplicateWorkflow {
                record_id: instance.record_id.clone(),
                process_type: instance.process_type.clone(),
            });
        }
        guard.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn get(&self, id: &WorkflowId) -> WorkflowResult<WorkflowInstance> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::WorkflowNotFound(id.clone()))
    }

    async fn update(&self, instance: WorkflowInstance) -> WorkflowResult<()> {
        let mut guard = self.write()?;
        if !guard.contains_key(&instance.id) {
            return Err(WorkflowError::WorkflowNotFound(instance.id.clone()));
        }
        guard.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn find_active_for_record(
        &self,
        record_id: &RecordId,
        process_type: &ProcessType,
    ) -> WorkflowResult<Option<WorkflowInstance>> {
        Ok(self
            .read()?
            .values()
            .find(|i| {
                i.is_active() && &i.record_id == record_id && &i.process_type == process_type
            })
            .cloned())
    }

    async fn list_active(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self
            .read()?
            .values()
            .filter(|i| i.is_active())
            .cloned()
            .collect())
    }

    async fn list_active_for_process(
        &self,
        process_type: &ProcessType,
    ) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self
            .read()?
            .values()
            .filter(|i| i.is_active() && &i.process_type == process_type)
            .cloned()
            .collect())
    }

    async fn list_assigned_to(&self, user_id: &UserId) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self
            .read()?
            .values()
            .filter(|i| i.is_active() && i.assigned_to.as_ref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> WorkflowResult<Vec<WorkflowInstance>> {
        Ok(self.read()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_types::StageId;

    fn make_instance(record: &str, process: &str) -> WorkflowInstance {
        WorkflowInstance::new(
            RecordId::new(record),
            ProcessType::new(process),
            StageId::new("qualification"),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryWorkflowStore::new();
        let instance = make_instance("record-1", "lead-to-quote");
        let id = instance.id.clone();

        store.insert(instance).await.unwrap();
        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.record_id, RecordId::new("record-1"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryWorkflowStore::new();
        let result = store.get(&WorkflowId::new("missing")).await;
        assert!(matches!(result, Err(WorkflowError::WorkflowNotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_active_workflow_rejected() {
        let store = InMemoryWorkflowStore::new();
        store
            .insert(make_instance("record-1", "lead-to-quote"))
            .await
            .unwrap();

        let result = store.insert(make_instance("record-1", "lead-to-quote")).await;
        assert!(matches!(result, Err(WorkflowError::DuplicateWorkflow { .. })));
    }

    #[tokio::test]
    async fn test_same_record_different_process_allowed() {
        let store = InMemoryWorkflowStore::new();
        store
            .insert(make_instance("record-1", "lead-to-quote"))
            .await
            .unwrap();
        store
            .insert(make_instance("record-1", "quote-to-proposal"))
            .await
            .unwrap();

        assert_eq!(store.list_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_instance_frees_the_record() {
        let store = InMemoryWorkflowStore::new();
        let mut instance = make_instance("record-1", "lead-to-quote");
        let id = instance.id.clone();
        store.insert(instance.clone()).await.unwrap();

        instance.cancel("restarting");
        store.update(instance).await.unwrap();

        // A fresh workflow for the same record + process is now allowed
        store
            .insert(make_instance("record-1", "lead-to-quote"))
            .await
            .unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);
        assert!(!store.get(&id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_update_missing() {
        let store = InMemoryWorkflowStore::new();
        let result = store.update(make_instance("record-1", "lead-to-quote")).await;
        assert!(matches!(result, Err(WorkflowError::WorkflowNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_active_for_record() {
        let store = InMemoryWorkflowStore::new();
        store
            .insert(make_instance("record-1", "lead-to-quote"))
            .await
            .unwrap();

        let found = store
            .find_active_for_record(&RecordId::new("record-1"), &ProcessType::new("lead-to-quote"))
            .await
            .unwrap();
        assert!(found.is_some());

        let absent = store
            .find_active_for_record(&RecordId::new("record-2"), &ProcessType::new("lead-to-quote"))
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_list_assigned_to() {
        let store = InMemoryWorkflowStore::new();
        let mut mine = make_instance("record-1", "lead-to-quote");
        mine.assign_to(UserId::new("dana"));
        let mut theirs = make_instance("record-2", "lead-to-quote");
        theirs.assign_to(UserId::new("sam"));
        store.insert(mine).await.unwrap();
        store.insert(theirs).await.unwrap();

        let assigned = store.list_assigned_to(&UserId::new("dana")).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].record_id, RecordId::new("record-1"));
    }

    #[tokio::test]
    async fn test_list_active_for_process() {
        let store = InMemoryWorkflowStore::new();
        store
            .insert(make_instance("record-1", "lead-to-quote"))
            .await
            .unwrap();
        store
            .insert(make_instance("record-2", "proposal-to-contract"))
            .await
            .unwrap();

        let quotes = store
            .list_active_for_process(&ProcessType::new("lead-to-quote"))
            .await
            .unwrap();
        assert_eq!(quotes.len(), 1);
    }
}
