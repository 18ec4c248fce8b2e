//! Change request manager
//!
//! Files, deduplicates, transitions and queries change requests. Every
//! read-modify-write holds the project's change-request lock, which is what
//! makes "at most one open request per task" hold under concurrent hooks.

use crate::error::{ScopeError, ScopeResult};
use chrono::{DateTime, Utc};
use scope_model::{
    new_change_request_id, ChangeRequest, ChangeRequestFilter, ChangeRequestStats,
    ChangeRequestStatus, ChangeRequestType, Impact, Priority, ProjectId, RiskLevel,
    ScopeCheckResult, TaskRecord, TransitionAction,
};
use scope_store::{ChangeRequestStore, ProjectLocks, Resource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for a manually filed change request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChangeRequest {
    #[serde(rename = "type")]
    pub kind: ChangeRequestType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub related_tasks: Vec<String>,
    #[serde(default)]
    pub related_requirements: Vec<String>,
    pub requested_by: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub estimated_effort: Option<f64>,
    pub reason: String,
}

impl NewChangeRequest {
    /// Check field-level constraints
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] naming the offending field
    pub fn validate(&self) -> ScopeResult<()> {
        if self.title.trim().is_empty() {
            return Err(ScopeError::validation("change request title must not be empty"));
        }
        if self.reason.trim().is_empty() {
            return Err(ScopeError::validation("change request reason must not be empty"));
        }
        if self.requested_by.trim().is_empty() {
            return Err(ScopeError::validation("requestedBy must not be empty"));
        }
        validate_effort(self.estimated_effort)
    }
}

/// Editable fields of an open change request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub estimated_effort: Option<f64>,
}

fn validate_effort(effort: Option<f64>) -> ScopeResult<()> {
    match effort {
        Some(hours) if !hours.is_finite() || hours < 0.0 => Err(ScopeError::validation(format!(
            "estimatedEffort must be a non-negative number of hours, got {hours}"
        ))),
        _ => Ok(()),
    }
}

/// What auto-filing did
#[derive(Debug, Clone, PartialEq)]
pub enum Filing {
    /// A new request was created
    Created(ChangeRequest),
    /// An open request already referenced the task; its `updatedAt` was refreshed
    Refreshed(ChangeRequest),
}

impl Filing {
    #[inline]
    #[must_use]
    pub fn change_request(&self) -> &ChangeRequest {
        match self {
            Filing::Created(cr) | Filing::Refreshed(cr) => cr,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Filing::Created(_))
    }
}

/// Change request persistence and lifecycle
#[derive(Clone)]
pub struct ChangeRequestManager {
    store: Arc<dyn ChangeRequestStore>,
    locks: Arc<ProjectLocks>,
}

impl std::fmt::Debug for ChangeRequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRequestManager").finish_non_exhaustive()
    }
}

impl ChangeRequestManager {
    #[must_use]
    pub fn new(store: Arc<dyn ChangeRequestStore>, locks: Arc<ProjectLocks>) -> Self {
        Self { store, locks }
    }

    /// File a scope-expansion request for an out-of-scope task, unless an
    /// open request already references it
    ///
    /// # Errors
    /// Returns [`ScopeError::Store`] if the store fails; nothing is written
    pub async fn file_for_task(
        &self,
        project: &ProjectId,
        task: &TaskRecord,
        check: &ScopeCheckResult,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> ScopeResult<Filing> {
        let _guard = self.locks.lock(project, Resource::ChangeRequests).await;

        let existing = self
            .store
            .list_change_requests(project)
            .await?
            .into_iter()
            .find(|cr| cr.status.is_open() && cr.references_task(&task.id));

        if let Some(mut open) = existing {
            open.updated_at = now;
            self.store.put_change_request(project, &open).await?;
            tracing::info!(
                project = %project,
                task = %task.id,
                change_request = %open.id,
                "open change request already covers task; refreshed"
            );
            return Ok(Filing::Refreshed(open));
        }

        let request = ChangeRequest {
            id: new_change_request_id(),
            kind: ChangeRequestType::ScopeExpansion,
            title: format!("Scope expansion: {}", task.title),
            description: if task.description.trim().is_empty() {
                task.title.clone()
            } else {
                task.description.clone()
            },
            status: ChangeRequestStatus::Pending,
            priority: Priority::Medium,
            impact: if check.risk_level == RiskLevel::High {
                Impact::High
            } else {
                Impact::Medium
            },
            related_tasks: vec![task.id.clone()],
            related_requirements: check.matched_requirement_ids.clone(),
            requested_by: requested_by.to_string(),
            assigned_to: None,
            estimated_effort: None,
            reason: check.reasoning.clone(),
            requested_at: now,
            updated_at: now,
            history: Vec::new(),
        };
        self.store.put_change_request(project, &request).await?;
        tracing::info!(
            project = %project,
            task = %task.id,
            change_request = %request.id,
            risk = %check.risk_level,
            "filed scope expansion change request"
        );
        Ok(Filing::Created(request))
    }

    /// Create a change request from validated input
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for bad input or
    /// [`ScopeError::Store`] if the store fails
    pub async fn create(
        &self,
        project: &ProjectId,
        input: NewChangeRequest,
        now: DateTime<Utc>,
    ) -> ScopeResult<ChangeRequest> {
        input.validate()?;
        let request = ChangeRequest {
            id: new_change_request_id(),
            kind: input.kind,
            title: input.title.trim().to_string(),
            description: input.description,
            status: ChangeRequestStatus::Pending,
            priority: input.priority,
            impact: input.impact,
            related_tasks: input.related_tasks,
            related_requirements: input.related_requirements,
            requested_by: input.requested_by,
            assigned_to: input.assigned_to,
            estimated_effort: input.estimated_effort,
            reason: input.reason,
            requested_at: now,
            updated_at: now,
            history: Vec::new(),
        };

        let _guard = self.locks.lock(project, Resource::ChangeRequests).await;
        self.store.put_change_request(project, &request).await?;
        tracing::info!(project = %project, change_request = %request.id, kind = %request.kind, "created change request");
        Ok(request)
    }

    /// Lookup a change request
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown ids
    pub async fn get(&self, project: &ProjectId, id: &str) -> ScopeResult<ChangeRequest> {
        self.store
            .get_change_request(project, id)
            .await?
            .ok_or_else(|| ScopeError::not_found("change request", id))
    }

    /// List change requests matching `filter`, oldest first
    ///
    /// # Errors
    /// Returns [`ScopeError::Store`] if the store fails
    pub async fn list(&self, project: &ProjectId, filter: ChangeRequestFilter) -> ScopeResult<Vec<ChangeRequest>> {
        Ok(self
            .store
            .list_change_requests(project)
            .await?
            .into_iter()
            .filter(|cr| filter.matches(cr))
            .collect())
    }

    /// All change requests, unfiltered
    ///
    /// # Errors
    /// Returns [`ScopeError::Store`] if the store fails
    pub async fn all(&self, project: &ProjectId) -> ScopeResult<Vec<ChangeRequest>> {
        Ok(self.store.list_change_requests(project).await?)
    }

    /// Apply a lifecycle transition
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for unknown ids and
    /// [`ScopeError::Conflict`] for illegal moves; state is left unchanged
    pub async fn transition(
        &self,
        project: &ProjectId,
        id: &str,
        action: TransitionAction,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> ScopeResult<ChangeRequest> {
        if actor.trim().is_empty() {
            return Err(ScopeError::validation("transition actor must not be empty"));
        }
        let _guard = self.locks.lock(project, Resource::ChangeRequests).await;
        let mut request = self.get(project, id).await?;
        let from = request.status;
        let to = request.transition(action, actor, note, now)?;
        self.store.put_change_request(project, &request).await?;
        tracing::info!(project = %project, change_request = %id, %from, %to, actor, "transitioned change request");
        Ok(request)
    }

    /// Edit an open change request
    ///
    /// # Errors
    /// Returns [`ScopeError::Conflict`] if the request is rejected or
    /// implemented, [`ScopeError::NotFound`] for unknown ids
    pub async fn update(
        &self,
        project: &ProjectId,
        id: &str,
        update: ChangeRequestUpdate,
        now: DateTime<Utc>,
    ) -> ScopeResult<ChangeRequest> {
        validate_effort(update.estimated_effort)?;
        let _guard = self.locks.lock(project, Resource::ChangeRequests).await;
        let mut request = self.get(project, id).await?;
        if request.status.is_terminal() {
            return Err(ScopeError::Conflict(format!(
                "change request {id} is {} and can no longer be edited",
                request.status
            )));
        }

        if let Some(description) = update.description {
            request.description = description;
        }
        if let Some(priority) = update.priority {
            request.priority = priority;
        }
        if let Some(impact) = update.impact {
            request.impact = impact;
        }
        if let Some(assignee) = update.assigned_to {
            request.assigned_to = Some(assignee).filter(|a| !a.trim().is_empty());
        }
        if let Some(hours) = update.estimated_effort {
            request.estimated_effort = Some(hours);
        }
        request.updated_at = now;

        self.store.put_change_request(project, &request).await?;
        tracing::debug!(project = %project, change_request = %id, "updated change request");
        Ok(request)
    }

    /// Counts by status and type
    ///
    /// # Errors
    /// Returns [`ScopeError::Store`] if the store fails
    pub async fn stats(&self, project: &ProjectId) -> ScopeResult<ChangeRequestStats> {
        let requests = self.store.list_change_requests(project).await?;
        Ok(ChangeRequestStats::from_requests(&requests))
    }
}
