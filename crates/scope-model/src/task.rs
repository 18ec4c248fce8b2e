//! Task records as seen by the scope engine
//!
//! Tasks belong to the task store. The engine only reads their text and
//! writes the `_scopeExtension` annotation; every other field is carried
//! through untouched.

use crate::labels::{RiskLevel, TaskOperation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task text submitted for a scope check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl TaskDraft {
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Title and description joined for matching
    #[must_use]
    pub fn text(&self) -> String {
        if self.description.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }
}

/// Verdict of a single scope check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeCheckResult {
    pub in_scope: bool,
    /// Always within [0, 1]
    pub confidence: f64,
    pub risk_level: RiskLevel,
    /// Best matches first
    pub matched_requirement_ids: Vec<String>,
    pub reasoning: String,
    pub checked_at: DateTime<Utc>,
    pub operation: TaskOperation,
    /// Categories detected in the task text
    #[serde(default)]
    pub categories: Vec<String>,
}

/// The `_scopeExtension` annotation stored on a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeExtension {
    #[serde(default)]
    pub matched_requirement_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_check: Option<ScopeCheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_request_id: Option<String>,
}

/// A task as stored by the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        rename = "_scopeExtension",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scope_extension: Option<ScopeExtension>,
    /// Fields owned by the task store (status, assignee, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            scope_extension: None,
            extra: Map::new(),
        }
    }

    /// Text used for scope matching
    #[inline]
    #[must_use]
    pub fn draft(&self) -> TaskDraft {
        TaskDraft::new(self.title.clone(), self.description.clone())
    }

    /// Requirement ids this task is associated with
    #[must_use]
    pub fn matched_requirement_ids(&self) -> &[String] {
        self.scope_extension
            .as_ref()
            .map_or(&[], |ext| ext.matched_requirement_ids.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn is_associated(&self) -> bool {
        !self.matched_requirement_ids().is_empty()
    }

    /// Most recent scope check, if any
    #[must_use]
    pub fn last_scope_check(&self) -> Option<&ScopeCheckResult> {
        self.scope_extension.as_ref()?.scope_check.as_ref()
    }

    /// Mutable annotation, created on first use
    pub fn extension_mut(&mut self) -> &mut ScopeExtension {
        self.scope_extension.get_or_insert_with(ScopeExtension::default)
    }
}
