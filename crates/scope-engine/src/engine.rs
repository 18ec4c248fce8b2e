//! Scope engine
//!
//! Orchestrates extraction, classification, association, change requests and
//! health over injected stores. Every read-modify-write on a project's state
//! holds the matching [`ProjectLocks`] guard; every mutation invalidates the
//! project's cached health.

use crate::association::{AssociationEngine, AssociationOutcome};
use crate::change_requests::{ChangeRequestManager, ChangeRequestUpdate, Filing, NewChangeRequest};
use crate::classifier::{should_auto_file, ScopeClassifier};
use crate::config::ScopeConfig;
use crate::error::{ScopeError, ScopeResult};
use crate::health::{HealthReporter, OpenChangeRequests, ScopeHealthReport, TaskScopeReport};
use crate::health_cache::HealthCache;
use chrono::Utc;
use scope_baseline::BaselineExtractor;
use scope_model::{
    ChangeRequest, ChangeRequestFilter, ChangeRequestStats, ContentHash, ProjectId, RequirementBaseline,
    ScopeCheckResult, TaskDraft, TaskOperation, TransitionAction,
};
use scope_store::{BaselineStore, ChangeRequestStore, ProjectLocks, Resource, TaskStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Store handles the engine reads and writes through
#[derive(Clone)]
pub struct ScopeStores {
    pub baselines: Arc<dyn BaselineStore>,
    pub change_requests: Arc<dyn ChangeRequestStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl ScopeStores {
    /// Use one backend for every kind of state
    #[must_use]
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: BaselineStore + ChangeRequestStore + TaskStore + 'static,
    {
        Self {
            baselines: store.clone(),
            change_requests: store.clone(),
            tasks: store,
        }
    }
}

impl std::fmt::Debug for ScopeStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStores").finish_non_exhaustive()
    }
}

/// Result of `analyze-prd`
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub baseline: RequirementBaseline,
    /// The PRD content matched the stored baseline and nothing was written
    pub unchanged: bool,
}

/// Advisory message attached to a task-mutation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeWarning {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_request_id: Option<String>,
}

/// What the task hook did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMutationOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_check: Option<ScopeCheckResult>,
    pub warnings: Vec<ScopeWarning>,
}

impl TaskMutationOutcome {
    /// Change request referenced by the warnings, if any
    #[must_use]
    pub fn change_request_id(&self) -> Option<&str> {
        self.warnings.iter().find_map(|w| w.change_request_id.as_deref())
    }
}

/// PRD scope governance engine
pub struct ScopeEngine {
    config: ScopeConfig,
    stores: ScopeStores,
    locks: Arc<ProjectLocks>,
    extractor: BaselineExtractor,
    classifier: ScopeClassifier,
    association: AssociationEngine,
    change_requests: ChangeRequestManager,
    reporter: HealthReporter,
    health_cache: HealthCache,
}

impl std::fmt::Debug for ScopeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeEngine")
            .field("config", &self.config)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl ScopeEngine {
    /// Create an engine over `stores`
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] if `config` is incoherent
    pub fn new(config: ScopeConfig, stores: ScopeStores) -> ScopeResult<Self> {
        config.validate()?;
        let locks = Arc::new(ProjectLocks::new());
        let classifier = ScopeClassifier::new(&config);
        Ok(Self {
            association: AssociationEngine::new(classifier.clone()),
            change_requests: ChangeRequestManager::new(stores.change_requests.clone(), Arc::clone(&locks)),
            reporter: HealthReporter::new(&config),
            health_cache: HealthCache::new(config.health_cache_ttl()),
            extractor: BaselineExtractor::new(),
            classifier,
            locks,
            stores,
            config,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn classifier(&self) -> &ScopeClassifier {
        &self.classifier
    }

    async fn ensure_project(&self, project: &ProjectId) -> ScopeResult<()> {
        if self.stores.tasks.project_exists(project).await? {
            Ok(())
        } else {
            Err(ScopeError::not_found("project", project.as_str()))
        }
    }

    async fn invalidate(&self, project: &ProjectId) {
        self.health_cache.invalidate(project).await;
    }

    // ---- Baseline ----

    /// Build or replace the project's baseline from PRD text
    ///
    /// Unchanged content is a successful no-op unless `force` is set.
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for empty text,
    /// [`ScopeError::NotFound`] for unknown projects
    pub async fn analyze_prd(
        &self,
        project: &ProjectId,
        prd_text: &str,
        source_document: &str,
        force: bool,
    ) -> ScopeResult<AnalysisOutcome> {
        if prd_text.trim().is_empty() {
            return Err(ScopeError::validation("PRD content is empty"));
        }
        self.ensure_project(project).await?;

        let guard = self.locks.lock(project, Resource::Baseline).await;
        let existing = self.stores.baselines.get_baseline(project).await?;
        let hash = ContentHash::compute(prd_text.as_bytes());

        if let Some(current) = existing.as_ref() {
            if !force && current.metadata().prd_source_hash == hash {
                tracing::info!(project = %project, hash = %hash.short(), "PRD unchanged; baseline kept");
                return Ok(AnalysisOutcome {
                    baseline: current.clone(),
                    unchanged: true,
                });
            }
        }

        let mut baseline = self.extractor.extract(project, prd_text, source_document, Utc::now());
        if let Some(previous) = existing.as_ref() {
            baseline = baseline.preserving_creation_times(previous);
        }
        self.stores.baselines.put_baseline(&baseline).await?;
        drop(guard);
        self.invalidate(project).await;

        let meta = baseline.metadata();
        tracing::info!(
            project = %project,
            source = source_document,
            total = meta.total_requirements,
            core = meta.core_requirements,
            extended = meta.extended_requirements,
            optional = meta.optional_requirements,
            structured = meta.structure_recognized,
            forced = force,
            "requirements baseline replaced"
        );
        for warning in &meta.warnings {
            tracing::warn!(project = %project, "{warning}");
        }
        Ok(AnalysisOutcome {
            baseline,
            unchanged: false,
        })
    }

    /// Current baseline, `None` before the first analysis
    ///
    /// # Errors
    /// Returns [`ScopeError::Store`] if the store fails
    pub async fn baseline(&self, project: &ProjectId) -> ScopeResult<Option<RequirementBaseline>> {
        Ok(self.stores.baselines.get_baseline(project).await?)
    }

    /// Current baseline, or `NotFound` if none exists
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects or missing baselines
    pub async fn requirements_baseline(&self, project: &ProjectId) -> ScopeResult<RequirementBaseline> {
        self.ensure_project(project).await?;
        self.baseline(project)
            .await?
            .ok_or_else(|| ScopeError::not_found("baseline", project.as_str()))
    }

    // ---- Classification ----

    /// Judge a task draft against the current baseline without side effects
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for an empty title and
    /// [`ScopeError::NotFound`] for unknown projects
    pub async fn check_task_scope(
        &self,
        project: &ProjectId,
        draft: &TaskDraft,
        operation: TaskOperation,
    ) -> ScopeResult<ScopeCheckResult> {
        if draft.title.trim().is_empty() {
            return Err(ScopeError::validation("task title must not be empty"));
        }
        self.ensure_project(project).await?;
        let baseline = self.baseline(project).await?;
        let result = self
            .classifier
            .classify(draft, operation, baseline.as_ref(), Utc::now());
        tracing::debug!(
            project = %project,
            in_scope = result.in_scope,
            confidence = result.confidence,
            risk = %result.risk_level,
            "task scope checked"
        );
        Ok(result)
    }

    /// Hook run after the task store created or updated `task_id`
    ///
    /// Never fails: scope governance is advisory, so any internal error is
    /// reported as a warning and the task mutation stands.
    pub async fn on_task_mutation(
        &self,
        project: &ProjectId,
        task_id: &str,
        operation: TaskOperation,
    ) -> TaskMutationOutcome {
        match self.scope_task_mutation(project, task_id, operation).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(project = %project, task = task_id, error = %err, "scope check failed; task mutation kept");
                TaskMutationOutcome {
                    scope_check: None,
                    warnings: vec![ScopeWarning {
                        message: format!("Scope check could not be completed: {err}"),
                        change_request_id: None,
                    }],
                }
            }
        }
    }

    async fn scope_task_mutation(
        &self,
        project: &ProjectId,
        task_id: &str,
        operation: TaskOperation,
    ) -> ScopeResult<TaskMutationOutcome> {
        let task = self
            .stores
            .tasks
            .get_task(project, task_id)
            .await?
            .ok_or_else(|| ScopeError::not_found("task", task_id))?;
        let baseline = self.baseline(project).await?;
        let now = Utc::now();
        let check = self
            .classifier
            .classify(&task.draft(), operation, baseline.as_ref(), now);

        let mut warnings = Vec::new();
        let mut change_request_id = None;
        if should_auto_file(&check, &self.config) {
            match self
                .change_requests
                .file_for_task(project, &task, &check, &self.config.system_actor, now)
                .await
            {
                Ok(filing) => {
                    let id = filing.change_request().id.clone();
                    let message = match &filing {
                        Filing::Created(_) => format!("Task is outside the requirements baseline; change request {id} filed. {}", check.reasoning),
                        Filing::Refreshed(_) => format!("Task is outside the requirements baseline; open change request {id} already covers it. {}", check.reasoning),
                    };
                    warnings.push(ScopeWarning {
                        message,
                        change_request_id: Some(id.clone()),
                    });
                    change_request_id = Some(id);
                }
                Err(err) => {
                    tracing::warn!(project = %project, task = task_id, error = %err, "failed to file change request");
                    warnings.push(ScopeWarning {
                        message: format!("Task appears out of scope but no change request could be filed: {err}"),
                        change_request_id: None,
                    });
                }
            }
        } else if !check.in_scope {
            warnings.push(ScopeWarning {
                message: format!("Task may be outside the requirements baseline. {}", check.reasoning),
                change_request_id: None,
            });
        }

        {
            let _guard = self.locks.lock(project, Resource::TaskAnnotations).await;
            let mut fresh = self
                .stores
                .tasks
                .get_task(project, task_id)
                .await?
                .ok_or_else(|| ScopeError::not_found("task", task_id))?;
            let associate = check.in_scope && !fresh.is_associated() && !check.matched_requirement_ids.is_empty();
            let ext = fresh.extension_mut();
            if associate {
                ext.matched_requirement_ids = check.matched_requirement_ids.clone();
                ext.association_confidence = Some(check.confidence);
                ext.associated_at = Some(now);
            }
            if let Some(id) = &change_request_id {
                ext.change_request_id = Some(id.clone());
            }
            ext.scope_check = Some(check.clone());
            self.stores.tasks.put_task(project, &fresh).await?;
        }
        self.invalidate(project).await;

        Ok(TaskMutationOutcome {
            scope_check: Some(check),
            warnings,
        })
    }

    // ---- Association ----

    /// Link unassociated tasks to their best-matching requirements
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects or when no
    /// baseline exists
    pub async fn auto_associate(&self, project: &ProjectId) -> ScopeResult<AssociationOutcome> {
        let baseline = self.requirements_baseline(project).await?;

        let guard = self.locks.lock(project, Resource::TaskAnnotations).await;
        let tasks = self.stores.tasks.list_tasks(project).await?;
        let plan = self.association.plan(&tasks, &baseline, Utc::now());
        for task in &plan.updates {
            self.stores.tasks.put_task(project, task).await?;
        }
        drop(guard);
        if !plan.updates.is_empty() {
            self.invalidate(project).await;
        }

        tracing::info!(
            project = %project,
            total = plan.outcome.total_tasks,
            associated = plan.outcome.associated_tasks,
            strengthened = plan.outcome.strengthened_tasks,
            "auto-association finished"
        );
        Ok(plan.outcome)
    }

    // ---- Change requests ----

    /// File a change request by hand
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for bad input and
    /// [`ScopeError::NotFound`] for unknown projects or requirement ids
    pub async fn create_change_request(
        &self,
        project: &ProjectId,
        input: NewChangeRequest,
    ) -> ScopeResult<ChangeRequest> {
        input.validate()?;
        self.ensure_project(project).await?;
        if !input.related_requirements.is_empty() {
            let baseline = self.baseline(project).await?;
            if let Some(unknown) = input
                .related_requirements
                .iter()
                .find(|id| baseline.as_ref().and_then(|b| b.requirement(id)).is_none())
            {
                return Err(ScopeError::not_found("requirement", unknown.as_str()));
            }
        }
        let created = self.change_requests.create(project, input, Utc::now()).await?;
        self.invalidate(project).await;
        Ok(created)
    }

    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown ids
    pub async fn change_request(&self, project: &ProjectId, id: &str) -> ScopeResult<ChangeRequest> {
        self.change_requests.get(project, id).await
    }

    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects
    pub async fn list_change_requests(
        &self,
        project: &ProjectId,
        filter: ChangeRequestFilter,
    ) -> ScopeResult<Vec<ChangeRequest>> {
        self.ensure_project(project).await?;
        self.change_requests.list(project, filter).await
    }

    /// Approve, reject or implement a change request
    ///
    /// # Errors
    /// Returns [`ScopeError::Conflict`] for illegal moves,
    /// [`ScopeError::NotFound`] for unknown ids
    pub async fn transition_change_request(
        &self,
        project: &ProjectId,
        id: &str,
        action: TransitionAction,
        actor: &str,
        note: Option<String>,
    ) -> ScopeResult<ChangeRequest> {
        let updated = self
            .change_requests
            .transition(project, id, action, actor, note, Utc::now())
            .await?;
        self.invalidate(project).await;
        Ok(updated)
    }

    /// # Errors
    /// Returns [`ScopeError::Conflict`] for terminal requests,
    /// [`ScopeError::NotFound`] for unknown ids
    pub async fn update_change_request(
        &self,
        project: &ProjectId,
        id: &str,
        update: ChangeRequestUpdate,
    ) -> ScopeResult<ChangeRequest> {
        let updated = self.change_requests.update(project, id, update, Utc::now()).await?;
        self.invalidate(project).await;
        Ok(updated)
    }

    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects
    pub async fn change_request_stats(&self, project: &ProjectId) -> ScopeResult<ChangeRequestStats> {
        self.ensure_project(project).await?;
        self.change_requests.stats(project).await
    }

    // ---- Health ----

    /// Project scope health, cached for the configured TTL
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects
    pub async fn scope_health(&self, project: &ProjectId) -> ScopeResult<Arc<ScopeHealthReport>> {
        self.ensure_project(project).await?;
        self.health_cache
            .try_get_or_insert_with(project, || async {
                let (baseline, tasks, requests) = futures::try_join!(
                    self.stores.baselines.get_baseline(project),
                    self.stores.tasks.list_tasks(project),
                    self.stores.change_requests.list_change_requests(project),
                )?;
                let health = self.reporter.health(baseline.as_ref(), &tasks, &requests, Utc::now());
                let change_requests = OpenChangeRequests {
                    pending: health.change_requests.pending,
                    approved: health.change_requests.approved,
                };
                Ok::<_, ScopeError>(ScopeHealthReport {
                    health,
                    baseline: baseline.map(|b| b.metadata().clone()),
                    change_requests,
                })
            })
            .await
    }

    /// Per-task compliance and coverage report
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown projects
    pub async fn task_scope_report(&self, project: &ProjectId) -> ScopeResult<TaskScopeReport> {
        self.ensure_project(project).await?;
        let (baseline, tasks) = futures::try_join!(
            self.stores.baselines.get_baseline(project),
            self.stores.tasks.list_tasks(project),
        )?;
        Ok(self.reporter.task_report(baseline.as_ref(), &tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_model::{ChangeRequestStatus, TaskRecord};
    use scope_store::MemoryStore;

    const PRD: &str = "## Functional Requirements\n\n- Create tasks with a title\n- Edit task details\n- Delete tasks\n";

    fn setup() -> (Arc<MemoryStore>, ScopeEngine, ProjectId) {
        let store = Arc::new(MemoryStore::new());
        let project = ProjectId::new("engine").unwrap();
        store.create_project(&project);
        let engine = ScopeEngine::new(ScopeConfig::default(), ScopeStores::shared(store.clone())).unwrap();
        (store, engine, project)
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let (_, engine, _) = setup();
        let ghost = ProjectId::new("ghost").unwrap();
        let err = engine.analyze_prd(&ghost, PRD, "prd.md", false).await.unwrap_err();
        assert!(matches!(err, ScopeError::NotFound { kind: "project", .. }));
        assert!(engine.scope_health(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn empty_prd_is_rejected_without_writes() {
        let (_, engine, project) = setup();
        let err = engine.analyze_prd(&project, "  \n", "prd.md", false).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(engine.baseline(&project).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn forced_reanalysis_keeps_creation_times() {
        let (_, engine, project) = setup();
        let first = engine.analyze_prd(&project, PRD, "prd.md", false).await.unwrap();
        assert!(!first.unchanged);

        let again = engine.analyze_prd(&project, PRD, "prd.md", false).await.unwrap();
        assert!(again.unchanged);

        let forced = engine.analyze_prd(&project, PRD, "prd.md", true).await.unwrap();
        assert!(!forced.unchanged);
        assert_eq!(
            forced.baseline.requirements()[0].created_at,
            first.baseline.requirements()[0].created_at
        );
    }

    #[tokio::test]
    async fn hook_reports_missing_task_as_warning() {
        let (_, engine, project) = setup();
        let outcome = engine.on_task_mutation(&project, "nope", TaskOperation::Update).await;
        assert!(outcome.scope_check.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].message.contains("task not found"));
    }

    #[tokio::test]
    async fn hook_annotates_in_scope_tasks() {
        let (store, engine, project) = setup();
        engine.analyze_prd(&project, PRD, "prd.md", false).await.unwrap();
        store.insert_task(&project, TaskRecord::new("t1", "Delete tasks", "Remove obsolete tasks"));

        let outcome = engine.on_task_mutation(&project, "t1", TaskOperation::Add).await;
        assert!(outcome.warnings.is_empty());
        assert!(outcome.scope_check.as_ref().unwrap().in_scope);

        let stored = store.tasks(&project).remove(0);
        assert!(stored.is_associated());
        assert!(stored.last_scope_check().unwrap().in_scope);
        assert!(stored.scope_extension.as_ref().unwrap().change_request_id.is_none());
    }

    #[tokio::test]
    async fn health_is_invalidated_by_mutations() {
        let (store, engine, project) = setup();
        let before = engine.scope_health(&project).await.unwrap();
        assert!(!before.health.has_baseline);

        engine.analyze_prd(&project, PRD, "prd.md", false).await.unwrap();
        let after = engine.scope_health(&project).await.unwrap();
        assert!(after.health.has_baseline);
        assert_eq!(after.baseline.as_ref().unwrap().total_requirements, 3);

        store.insert_task(&project, TaskRecord::new("t1", "Integrate payment gateway", "Charge credit cards"));
        let outcome = engine.on_task_mutation(&project, "t1", TaskOperation::Add).await;
        let cr_id = outcome.change_request_id().unwrap().to_string();

        let health = engine.scope_health(&project).await.unwrap();
        assert_eq!(health.change_requests.pending, 1);

        engine
            .transition_change_request(&project, &cr_id, TransitionAction::Approve, "lead", None)
            .await
            .unwrap();
        let health = engine.scope_health(&project).await.unwrap();
        assert_eq!(health.change_requests.pending, 0);
        assert_eq!(health.change_requests.approved, 1);
        assert_eq!(
            engine.change_request(&project, &cr_id).await.unwrap().status,
            ChangeRequestStatus::Approved
        );
    }

    #[tokio::test]
    async fn manual_requests_must_reference_known_requirements() {
        let (_, engine, project) = setup();
        engine.analyze_prd(&project, PRD, "prd.md", false).await.unwrap();
        let input = NewChangeRequest {
            kind: scope_model::ChangeRequestType::RequirementChange,
            title: "Clarify editing".to_string(),
            description: String::new(),
            priority: scope_model::Priority::Medium,
            impact: scope_model::Impact::Low,
            related_tasks: Vec::new(),
            related_requirements: vec!["REQ-404-deadbeef".to_string()],
            requested_by: "pm".to_string(),
            assigned_to: None,
            estimated_effort: None,
            reason: "ambiguous".to_string(),
        };
        let err = engine.create_change_request(&project, input).await.unwrap_err();
        assert!(matches!(err, ScopeError::NotFound { kind: "requirement", .. }));
        assert_eq!(engine.change_request_stats(&project).await.unwrap().total, 0);
    }
}
