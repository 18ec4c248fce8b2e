//! REST-shaped facade
//!
//! One method per endpoint of the `/projects/{id}/scope/...` surface. Bodies
//! are camelCase JSON; path parameters arrive as raw strings and are
//! validated here, so a transport layer only has to route and serialize.

use crate::association::AssociationOutcome;
use crate::change_requests::{ChangeRequestUpdate, NewChangeRequest};
use crate::engine::{ScopeEngine, TaskMutationOutcome};
use crate::error::ScopeResult;
use crate::health::{ScopeHealthReport, TaskScopeReport};
use crate::loader::DocumentLoader;
use scope_model::{
    ChangeRequest, ChangeRequestFilter, ChangeRequestStats, ProjectId, RequirementBaseline,
    ScopeCheckResult, TaskDraft, TaskOperation, TransitionAction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `POST /projects/{id}/scope/analyze-prd`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePrdRequest {
    pub prd_file_path: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePrdResponse {
    pub total_requirements: usize,
    pub core_requirements: usize,
    pub extended_requirements: usize,
    pub optional_requirements: usize,
    /// Content matched the stored baseline; nothing was rewritten
    pub unchanged: bool,
    pub structure_recognized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `POST /projects/{id}/scope/check-task-scope`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTaskScopeRequest {
    pub task: TaskDraft,
    #[serde(default = "default_operation")]
    pub operation: TaskOperation,
}

fn default_operation() -> TaskOperation {
    TaskOperation::Add
}

/// `POST /projects/{id}/scope/change-requests/{crId}/transition`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub action: TransitionAction,
    pub actor: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Scope endpoints over an engine and a document loader
#[derive(Clone)]
pub struct ScopeService {
    engine: Arc<ScopeEngine>,
    loader: Arc<dyn DocumentLoader>,
}

impl std::fmt::Debug for ScopeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeService")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl ScopeService {
    #[must_use]
    pub fn new(engine: Arc<ScopeEngine>, loader: Arc<dyn DocumentLoader>) -> Self {
        Self { engine, loader }
    }

    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Arc<ScopeEngine> {
        &self.engine
    }

    /// # Errors
    /// Validation, not-found and store errors from loading and extraction
    pub async fn analyze_prd(&self, project: &str, request: AnalyzePrdRequest) -> ScopeResult<AnalyzePrdResponse> {
        let project = ProjectId::new(project)?;
        let document = self.loader.load(&request.prd_file_path).await?;
        let outcome = self
            .engine
            .analyze_prd(&project, &document.content, &document.name, request.force)
            .await?;
        let meta = outcome.baseline.metadata();
        Ok(AnalyzePrdResponse {
            total_requirements: meta.total_requirements,
            core_requirements: meta.core_requirements,
            extended_requirements: meta.extended_requirements,
            optional_requirements: meta.optional_requirements,
            unchanged: outcome.unchanged,
            structure_recognized: meta.structure_recognized,
            warnings: meta.warnings.clone(),
        })
    }

    /// # Errors
    /// Validation errors for an empty title, not-found for unknown projects
    pub async fn check_task_scope(&self, project: &str, request: CheckTaskScopeRequest) -> ScopeResult<ScopeCheckResult> {
        let project = ProjectId::new(project)?;
        self.engine
            .check_task_scope(&project, &request.task, request.operation)
            .await
    }

    /// # Errors
    /// Not-found when the project or its baseline is missing
    pub async fn auto_associate_tasks(&self, project: &str) -> ScopeResult<AssociationOutcome> {
        let project = ProjectId::new(project)?;
        self.engine.auto_associate(&project).await
    }

    /// # Errors
    /// Not-found when the project or its baseline is missing
    pub async fn get_requirements_baseline(&self, project: &str) -> ScopeResult<RequirementBaseline> {
        let project = ProjectId::new(project)?;
        self.engine.requirements_baseline(&project).await
    }

    /// # Errors
    /// Not-found for unknown projects
    pub async fn task_scope_report(&self, project: &str) -> ScopeResult<TaskScopeReport> {
        let project = ProjectId::new(project)?;
        self.engine.task_scope_report(&project).await
    }

    /// # Errors
    /// Not-found for unknown projects
    pub async fn scope_health(&self, project: &str) -> ScopeResult<ScopeHealthReport> {
        let project = ProjectId::new(project)?;
        let report = self.engine.scope_health(&project).await?;
        Ok(ScopeHealthReport::clone(&report))
    }

    /// # Errors
    /// Not-found for unknown projects
    pub async fn list_change_requests(
        &self,
        project: &str,
        filter: ChangeRequestFilter,
    ) -> ScopeResult<Vec<ChangeRequest>> {
        let project = ProjectId::new(project)?;
        self.engine.list_change_requests(&project, filter).await
    }

    /// # Errors
    /// Not-found for unknown change request ids
    pub async fn get_change_request(&self, project: &str, id: &str) -> ScopeResult<ChangeRequest> {
        let project = ProjectId::new(project)?;
        self.engine.change_request(&project, id).await
    }

    /// # Errors
    /// Validation and not-found errors from the engine
    pub async fn create_change_request(&self, project: &str, request: NewChangeRequest) -> ScopeResult<ChangeRequest> {
        let project = ProjectId::new(project)?;
        self.engine.create_change_request(&project, request).await
    }

    /// # Errors
    /// Conflict for illegal moves, not-found for unknown ids
    pub async fn transition_change_request(
        &self,
        project: &str,
        id: &str,
        request: TransitionRequest,
    ) -> ScopeResult<ChangeRequest> {
        let project = ProjectId::new(project)?;
        self.engine
            .transition_change_request(&project, id, request.action, &request.actor, request.note)
            .await
    }

    /// # Errors
    /// Conflict for terminal requests, not-found for unknown ids
    pub async fn update_change_request(
        &self,
        project: &str,
        id: &str,
        update: ChangeRequestUpdate,
    ) -> ScopeResult<ChangeRequest> {
        let project = ProjectId::new(project)?;
        self.engine.update_change_request(&project, id, update).await
    }

    /// # Errors
    /// Not-found for unknown projects
    pub async fn change_request_stats(&self, project: &str) -> ScopeResult<ChangeRequestStats> {
        let project = ProjectId::new(project)?;
        self.engine.change_request_stats(&project).await
    }

    /// Task-store hook for a created task; warnings go into the create response
    pub async fn on_task_created(&self, project: &str, task_id: &str) -> TaskMutationOutcome {
        self.on_task_mutation(project, task_id, TaskOperation::Add).await
    }

    /// Task-store hook for an updated task
    pub async fn on_task_updated(&self, project: &str, task_id: &str) -> TaskMutationOutcome {
        self.on_task_mutation(project, task_id, TaskOperation::Update).await
    }

    async fn on_task_mutation(&self, project: &str, task_id: &str, operation: TaskOperation) -> TaskMutationOutcome {
        match ProjectId::new(project) {
            Ok(project) => self.engine.on_task_mutation(&project, task_id, operation).await,
            Err(err) => TaskMutationOutcome {
                scope_check: None,
                warnings: vec![crate::engine::ScopeWarning {
                    message: format!("Scope check could not be completed: {err}"),
                    change_request_id: None,
                }],
            },
        }
    }
}
