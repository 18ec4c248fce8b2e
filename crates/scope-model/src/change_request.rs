//! Change requests and their lifecycle
//!
//! ```text
//! pending ──approve──▶ approved ──implement──▶ implemented
//!    │
//!    └────reject─────▶ rejected
//! ```
//! `rejected` and `implemented` are terminal.

use crate::labels::{Impact, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

label_enum! {
    /// Kind of change being requested
    ChangeRequestType {
        ScopeExpansion => "scope_expansion",
        RequirementChange => "requirement_change",
        TaskModification => "task_modification",
    }
}

label_enum! {
    /// Lifecycle status
    ChangeRequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Implemented => "implemented",
    }
}

impl ChangeRequestStatus {
    /// Pending or approved requests still block a new auto-filed request
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Implemented)
    }

    /// Status reached by applying `action`, or why that is illegal
    ///
    /// # Errors
    /// Returns [`TransitionError`] for any move not in the lifecycle graph
    pub fn apply(self, action: TransitionAction) -> Result<Self, TransitionError> {
        match (self, action) {
            (Self::Pending, TransitionAction::Approve) => Ok(Self::Approved),
            (Self::Pending, TransitionAction::Reject) => Ok(Self::Rejected),
            (Self::Approved, TransitionAction::Implement) => Ok(Self::Implemented),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}

label_enum! {
    /// Operation requested on a change request
    TransitionAction {
        Approve => "approve",
        Reject => "reject",
        Implement => "implement",
    }
}

/// Illegal status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a change request that is {from}")]
pub struct TransitionError {
    pub from: ChangeRequestStatus,
    pub action: TransitionAction,
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: ChangeRequestStatus,
    pub to: ChangeRequestStatus,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A request to change the agreed scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChangeRequestType,
    pub title: String,
    pub description: String,
    pub status: ChangeRequestStatus,
    pub priority: Priority,
    pub impact: Impact,
    #[serde(default)]
    pub related_tasks: Vec<String>,
    #[serde(default)]
    pub related_requirements: Vec<String>,
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<f64>,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl ChangeRequest {
    /// Whether this request references `task_id`
    #[inline]
    #[must_use]
    pub fn references_task(&self, task_id: &str) -> bool {
        self.related_tasks.iter().any(|t| t == task_id)
    }

    /// Apply a status transition, recording it in the history
    ///
    /// # Errors
    /// Returns [`TransitionError`] and leaves the request untouched when the
    /// move is illegal
    pub fn transition(
        &mut self,
        action: TransitionAction,
        actor: impl Into<String>,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ChangeRequestStatus, TransitionError> {
        let next = self.status.apply(action)?;
        self.history.push(StatusChange {
            from: self.status,
            to: next,
            actor: actor.into(),
            note,
            at,
        });
        self.status = next;
        self.updated_at = at;
        Ok(next)
    }
}

/// Listing filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestFilter {
    #[serde(default)]
    pub status: Option<ChangeRequestStatus>,
    #[serde(default, rename = "type")]
    pub kind: Option<ChangeRequestType>,
}

impl ChangeRequestFilter {
    #[inline]
    #[must_use]
    pub fn matches(&self, cr: &ChangeRequest) -> bool {
        self.status.map_or(true, |s| s == cr.status) && self.kind.map_or(true, |k| k == cr.kind)
    }
}

/// Counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub implemented: usize,
}

impl StatusCounts {
    /// Tally a set of change requests
    pub fn tally<'a>(requests: impl IntoIterator<Item = &'a ChangeRequest>) -> Self {
        let mut counts = Self::default();
        for cr in requests {
            match cr.status {
                ChangeRequestStatus::Pending => counts.pending += 1,
                ChangeRequestStatus::Approved => counts.approved += 1,
                ChangeRequestStatus::Rejected => counts.rejected += 1,
                ChangeRequestStatus::Implemented => counts.implemented += 1,
            }
        }
        counts
    }

    #[inline]
    #[must_use]
    pub fn open(&self) -> usize {
        self.pending + self.approved
    }

    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.implemented
    }
}

/// Aggregate statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestStats {
    pub total: usize,
    pub open: usize,
    pub by_status: StatusCounts,
    pub by_type: BTreeMap<ChangeRequestType, usize>,
}

impl ChangeRequestStats {
    pub fn from_requests<'a>(requests: impl IntoIterator<Item = &'a ChangeRequest> + Clone) -> Self {
        let by_status = StatusCounts::tally(requests.clone());
        let mut by_type = BTreeMap::new();
        for cr in requests {
            *by_type.entry(cr.kind).or_insert(0) += 1;
        }
        Self {
            total: by_status.total(),
            open: by_status.open(),
            by_status,
            by_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ChangeRequest {
        let now = Utc::now();
        ChangeRequest {
            id: "CR-1".to_string(),
            kind: ChangeRequestType::ScopeExpansion,
            title: "Scope expansion".to_string(),
            description: String::new(),
            status: ChangeRequestStatus::Pending,
            priority: Priority::Medium,
            impact: Impact::High,
            related_tasks: vec!["t1".to_string()],
            related_requirements: Vec::new(),
            requested_by: "system".to_string(),
            assigned_to: None,
            estimated_effort: None,
            reason: "no matching requirement".to_string(),
            requested_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    #[test]
    fn approve_then_implement() {
        let mut cr = pending();
        assert_eq!(
            cr.transition(TransitionAction::Approve, "lead", None, Utc::now()),
            Ok(ChangeRequestStatus::Approved)
        );
        assert_eq!(
            cr.transition(TransitionAction::Implement, "dev", Some("done".into()), Utc::now()),
            Ok(ChangeRequestStatus::Implemented)
        );
        assert_eq!(cr.history.len(), 2);
        assert!(cr.status.is_terminal());
    }

    #[test]
    fn rejected_is_terminal() {
        let mut cr = pending();
        cr.transition(TransitionAction::Reject, "lead", None, Utc::now()).unwrap();
        let before = cr.clone();

        let err = cr
            .transition(TransitionAction::Approve, "lead", None, Utc::now())
            .unwrap_err();
        assert_eq!(err.from, ChangeRequestStatus::Rejected);
        assert_eq!(cr, before);
    }

    #[test]
    fn pending_cannot_be_implemented_directly() {
        assert!(ChangeRequestStatus::Pending.apply(TransitionAction::Implement).is_err());
        assert!(ChangeRequestStatus::Approved.apply(TransitionAction::Reject).is_err());
    }

    #[test]
    fn serializes_type_field() {
        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["type"], "scope_expansion");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["relatedTasks"][0], "t1");
    }

    #[test]
    fn labels_parse_and_display() {
        assert_eq!(" Approve ".parse::<TransitionAction>(), Ok(TransitionAction::Approve));
        assert_eq!(
            "requirement_change".parse::<ChangeRequestType>(),
            Ok(ChangeRequestType::RequirementChange)
        );
        assert_eq!(ChangeRequestStatus::Implemented.to_string(), "implemented");
        let err = "archive".parse::<TransitionAction>().unwrap_err();
        assert_eq!(err.kind, "TransitionAction");
        assert_eq!(ChangeRequestStatus::ALL.len(), 4);
    }

    #[test]
    fn stats_and_filters() {
        let mut approved = pending();
        approved.status = ChangeRequestStatus::Approved;
        let mut other = pending();
        other.kind = ChangeRequestType::RequirementChange;
        let all = vec![pending(), approved, other];

        let stats = ChangeRequestStats::from_requests(&all);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.open, 3);
        assert_eq!(stats.by_status.pending, 2);
        assert_eq!(stats.by_type[&ChangeRequestType::ScopeExpansion], 2);

        let filter = ChangeRequestFilter {
            status: Some(ChangeRequestStatus::Pending),
            kind: Some(ChangeRequestType::ScopeExpansion),
        };
        assert_eq!(all.iter().filter(|cr| filter.matches(cr)).count(), 1);
    }
}
