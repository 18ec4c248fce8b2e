//! Requirements and the per-project requirement baseline

use crate::hash::ContentHash;
use crate::ids::ProjectId;
use crate::labels::{Priority, RequirementScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A single requirement extracted from a PRD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// Stable id (`REQ-<position>-<fingerprint>`)
    pub id: String,
    pub title: String,
    pub description: String,
    pub scope: RequirementScope,
    pub priority: Priority,
    /// Free-text category label, e.g. `authentication`
    pub category: String,
    /// Source document name
    pub extracted_from: String,
    pub created_at: DateTime<Utc>,
}

impl Requirement {
    /// Title and description joined for matching
    #[must_use]
    pub fn text(&self) -> String {
        if self.description.is_empty() || self.description == self.title {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.description)
        }
    }
}

/// Where a baseline came from and how the analysis went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSource {
    pub source_document: String,
    pub document_title: Option<String>,
    pub prd_source_hash: ContentHash,
    pub analyzed_at: DateTime<Utc>,
    /// False when no recognizable PRD section was found
    pub structure_recognized: bool,
    /// Recognized section headings, in document order
    pub sections: Vec<String>,
    pub warnings: Vec<String>,
}

/// Baseline metadata; counts always mirror the requirement list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineMetadata {
    pub total_requirements: usize,
    pub core_requirements: usize,
    pub extended_requirements: usize,
    pub optional_requirements: usize,
    pub prd_source_hash: ContentHash,
    pub last_analyzed: DateTime<Utc>,
    pub source_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    pub structure_recognized: bool,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// The structured requirement set a project's tasks are judged against
///
/// Requirements keep PRD section order. Metadata is derived on
/// construction and never edited independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementBaseline {
    project_id: ProjectId,
    requirements: Vec<Requirement>,
    metadata: BaselineMetadata,
}

impl RequirementBaseline {
    /// Build a baseline, deriving its metadata counts
    #[must_use]
    pub fn new(project_id: ProjectId, requirements: Vec<Requirement>, source: BaselineSource) -> Self {
        let count = |scope: RequirementScope| requirements.iter().filter(|r| r.scope == scope).count();

        let metadata = BaselineMetadata {
            total_requirements: requirements.len(),
            core_requirements: count(RequirementScope::Core),
            extended_requirements: count(RequirementScope::Extended),
            optional_requirements: count(RequirementScope::Optional),
            prd_source_hash: source.prd_source_hash,
            last_analyzed: source.analyzed_at,
            source_document: source.source_document,
            document_title: source.document_title,
            structure_recognized: source.structure_recognized,
            sections: source.sections,
            warnings: source.warnings,
        };

        Self {
            project_id,
            requirements,
            metadata,
        }
    }

    #[inline]
    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    #[inline]
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &BaselineMetadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Lookup a requirement by id
    #[must_use]
    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    /// Distinct categories present in the baseline
    #[must_use]
    pub fn categories(&self) -> BTreeSet<&str> {
        self.requirements.iter().map(|r| r.category.as_str()).collect()
    }

    /// Whether the metadata counts agree with the requirement list.
    ///
    /// Always true for baselines built through [`RequirementBaseline::new`];
    /// stores use it to reject tampered documents.
    #[must_use]
    pub fn counts_consistent(&self) -> bool {
        let count = |scope: RequirementScope| self.requirements.iter().filter(|r| r.scope == scope).count();
        self.metadata.total_requirements == self.requirements.len()
            && self.metadata.core_requirements == count(RequirementScope::Core)
            && self.metadata.extended_requirements == count(RequirementScope::Extended)
            && self.metadata.optional_requirements == count(RequirementScope::Optional)
    }

    /// Keep `createdAt` of requirements whose id also exists in `previous`.
    #[must_use]
    pub fn preserving_creation_times(mut self, previous: &RequirementBaseline) -> Self {
        let created: HashMap<&str, DateTime<Utc>> = previous
            .requirements
            .iter()
            .map(|r| (r.id.as_str(), r.created_at))
            .collect();
        for requirement in &mut self.requirements {
            if let Some(at) = created.get(requirement.id.as_str()) {
                requirement.created_at = *at;
            }
        }
        self
    }
}
