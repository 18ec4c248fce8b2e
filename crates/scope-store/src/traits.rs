//! Store contracts
//!
//! The engine never touches files directly. Each kind of per-project state
//! sits behind one of these traits so hosts can inject JSON files, a
//! database, or in-memory fakes.

use crate::error::StoreResult;
use async_trait::async_trait;
use scope_model::{ChangeRequest, ProjectId, RequirementBaseline, TaskRecord};

/// Requirement baselines, one per project
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Current baseline, `None` before the first analysis
    async fn get_baseline(&self, project: &ProjectId) -> StoreResult<Option<RequirementBaseline>>;

    /// Replace the project's baseline as a single commit
    async fn put_baseline(&self, baseline: &RequirementBaseline) -> StoreResult<()>;
}

/// Change requests, kept in filing order
#[async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// All change requests of a project, oldest first
    async fn list_change_requests(&self, project: &ProjectId) -> StoreResult<Vec<ChangeRequest>>;

    /// Lookup by id
    async fn get_change_request(&self, project: &ProjectId, id: &str) -> StoreResult<Option<ChangeRequest>>;

    /// Insert or replace (matched by id)
    async fn put_change_request(&self, project: &ProjectId, request: &ChangeRequest) -> StoreResult<()>;
}

/// Task store collaborator
///
/// Owned by the hosting application; the engine only reads tasks and
/// writes back their `_scopeExtension`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn project_exists(&self, project: &ProjectId) -> StoreResult<bool>;

    async fn list_tasks(&self, project: &ProjectId) -> StoreResult<Vec<TaskRecord>>;

    async fn get_task(&self, project: &ProjectId, task_id: &str) -> StoreResult<Option<TaskRecord>>;

    /// Insert or replace (matched by id)
    ///
    /// Writing a task into an unknown project registers that project, so
    /// [`TaskStore::project_exists`] reports it afterwards.
    async fn put_task(&self, project: &ProjectId, task: &TaskRecord) -> StoreResult<()>;
}
