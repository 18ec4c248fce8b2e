//! Derived scope-health records (never persisted)

use crate::change_request::StatusCounts;
use crate::labels::{Priority, RiskLevel};
use serde::{Deserialize, Serialize};

/// Direction of change-request volume between two time windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestTrend {
    Increasing,
    Stable,
    Decreasing,
}

impl ChangeRequestTrend {
    /// Compare the recent window against the prior one
    #[must_use]
    pub fn compare(recent: usize, prior: usize, tolerance: usize) -> Self {
        if recent.abs_diff(prior) <= tolerance {
            Self::Stable
        } else if recent > prior {
            Self::Increasing
        } else {
            Self::Decreasing
        }
    }
}

/// Prioritized advice attached to reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub message: String,
}

impl Recommendation {
    #[inline]
    #[must_use]
    pub fn new(priority: Priority, message: impl Into<String>) -> Self {
        Self {
            priority,
            message: message.into(),
        }
    }
}

/// Project scope health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeHealth {
    pub has_baseline: bool,
    pub risk_level: RiskLevel,
    pub change_request_trend: ChangeRequestTrend,
    pub recommendations: Vec<String>,
    pub change_requests: StatusCounts,
    /// Percentage of requirements with at least one associated task
    pub requirements_coverage: f64,
    /// Percentage of checked tasks whose last check was in scope
    pub scope_compliance: f64,
}
