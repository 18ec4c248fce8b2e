//! In-memory store implementing every store contract
//!
//! Used by tests and by hosts that keep tasks in process. Baselines live in
//! a [`DashMap`]; change requests and tasks keep insertion order behind
//! read-write locks.

use crate::error::StoreResult;
use crate::traits::{BaselineStore, ChangeRequestStore, TaskStore};
use async_trait::async_trait;
use dashmap::DashMap;
use scope_model::{ChangeRequest, ProjectId, RequirementBaseline, TaskRecord};
use std::collections::{HashMap, HashSet};
use parking_lot::RwLock;

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<HashSet<ProjectId>>,
    baselines: DashMap<ProjectId, RequirementBaseline>,
    change_requests: RwLock<HashMap<ProjectId, Vec<ChangeRequest>>>,
    tasks: RwLock<HashMap<ProjectId, Vec<TaskRecord>>>,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project so [`TaskStore::project_exists`] reports it
    pub fn create_project(&self, project: &ProjectId) {
        self.projects.write().insert(project.clone());
    }

    /// Seed a task directly, registering its project
    pub fn insert_task(&self, project: &ProjectId, task: TaskRecord) {
        self.create_project(project);
        upsert_by(self.tasks.write().entry(project.clone()).or_default(), task, |t| &t.id);
    }

    /// Snapshot of a project's tasks
    #[must_use]
    pub fn tasks(&self, project: &ProjectId) -> Vec<TaskRecord> {
        self.tasks.read().get(project).cloned().unwrap_or_default()
    }
}

/// Replace the item with the same key, or append
pub(crate) fn upsert_by<T>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| key(existing) == key(&item)) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

#[async_trait]
impl BaselineStore for MemoryStore {
    async fn get_baseline(&self, project: &ProjectId) -> StoreResult<Option<RequirementBaseline>> {
        Ok(self.baselines.get(project).map(|b| b.value().clone()))
    }

    async fn put_baseline(&self, baseline: &RequirementBaseline) -> StoreResult<()> {
        self.baselines
            .insert(baseline.project_id().clone(), baseline.clone());
        Ok(())
    }
}

#[async_trait]
impl ChangeRequestStore for MemoryStore {
    async fn list_change_requests(&self, project: &ProjectId) -> StoreResult<Vec<ChangeRequest>> {
        Ok(self
            .change_requests
            .read()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_change_request(&self, project: &ProjectId, id: &str) -> StoreResult<Option<ChangeRequest>> {
        Ok(self
            .change_requests
            .read()
            .get(project)
            .and_then(|list| list.iter().find(|cr| cr.id == id))
            .cloned())
    }

    async fn put_change_request(&self, project: &ProjectId, request: &ChangeRequest) -> StoreResult<()> {
        upsert_by(
            self.change_requests.write().entry(project.clone()).or_default(),
            request.clone(),
            |cr| &cr.id,
        );
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn project_exists(&self, project: &ProjectId) -> StoreResult<bool> {
        Ok(self.projects.read().contains(project))
    }

    async fn list_tasks(&self, project: &ProjectId) -> StoreResult<Vec<TaskRecord>> {
        Ok(self.tasks(project))
    }

    async fn get_task(&self, project: &ProjectId, task_id: &str) -> StoreResult<Option<TaskRecord>> {
        Ok(self
            .tasks
            .read()
            .get(project)
            .and_then(|tasks| tasks.iter().find(|t| t.id == task_id))
            .cloned())
    }

    async fn put_task(&self, project: &ProjectId, task: &TaskRecord) -> StoreResult<()> {
        self.insert_task(project, task.clone());
        Ok(())
    }
}
