//! Health reporter
//!
//! Pure aggregation over a baseline snapshot, the project's tasks and its
//! change requests. Nothing computed here is persisted.

use crate::config::ScopeConfig;
use chrono::{DateTime, Utc};
use scope_model::{
    BaselineMetadata, ChangeRequest, ChangeRequestTrend, Priority, Recommendation, RequirementBaseline,
    RiskLevel, ScopeHealth, StatusCounts, TaskRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const HIGH_RISK_COMPLIANCE_PCT: f64 = 50.0;
const HIGH_RISK_PENDING: usize = 5;

/// Coverage of baseline requirements by associated tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsCoverage {
    pub total_requirements: usize,
    pub covered_requirements: usize,
    /// Percentage, two decimals
    pub coverage: f64,
    pub uncovered_requirement_ids: Vec<String>,
}

impl RequirementsCoverage {
    #[must_use]
    pub fn compute(baseline: &RequirementBaseline, tasks: &[TaskRecord]) -> Self {
        let linked: HashSet<&str> = tasks
            .iter()
            .flat_map(|t| t.matched_requirement_ids().iter().map(String::as_str))
            .collect();

        let mut covered = 0;
        let mut uncovered = Vec::new();
        for requirement in baseline.requirements() {
            if linked.contains(requirement.id.as_str()) {
                covered += 1;
            } else {
                uncovered.push(requirement.id.clone());
            }
        }

        Self {
            total_requirements: baseline.len(),
            covered_requirements: covered,
            coverage: percent(covered, baseline.len(), 0.0),
            uncovered_requirement_ids: uncovered,
        }
    }
}

/// Task-level counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScopeSummary {
    pub total_tasks: usize,
    /// Percentage of all tasks whose last check was in scope; unchecked
    /// tasks count against it
    pub scope_compliance: f64,
    pub tasks_with_requirements: usize,
    pub tasks_with_scope_check: usize,
}

impl TaskScopeSummary {
    #[must_use]
    pub fn compute(tasks: &[TaskRecord]) -> Self {
        let checked: Vec<_> = tasks.iter().filter_map(TaskRecord::last_scope_check).collect();
        let in_scope = checked.iter().filter(|c| c.in_scope).count();
        Self {
            total_tasks: tasks.len(),
            scope_compliance: percent(in_scope, tasks.len(), 100.0),
            tasks_with_requirements: tasks.iter().filter(|t| t.is_associated()).count(),
            tasks_with_scope_check: checked.len(),
        }
    }
}

/// Task scope report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScopeReport {
    pub summary: TaskScopeSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_coverage: Option<RequirementsCoverage>,
    /// Tasks whose last scope check was out of scope
    pub out_of_scope_task_ids: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

/// Open change request counts shown next to health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChangeRequests {
    pub pending: usize,
    pub approved: usize,
}

/// Scope health plus the context a dashboard shows next to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeHealthReport {
    pub health: ScopeHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineMetadata>,
    pub change_requests: OpenChangeRequests,
}

/// Health computations parameterized by configuration
#[derive(Debug, Clone)]
pub struct HealthReporter {
    config: ScopeConfig,
}

impl HealthReporter {
    #[must_use]
    pub fn new(config: &ScopeConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Compute project scope health
    #[must_use]
    pub fn health(
        &self,
        baseline: Option<&RequirementBaseline>,
        tasks: &[TaskRecord],
        requests: &[ChangeRequest],
        now: DateTime<Utc>,
    ) -> ScopeHealth {
        let counts = StatusCounts::tally(requests);
        let summary = TaskScopeSummary::compute(tasks);
        let coverage = baseline.map_or(0.0, |b| RequirementsCoverage::compute(b, tasks).coverage);
        let trend = self.trend(requests, now);

        let risk_level = self.risk_level(baseline.is_some(), summary.scope_compliance, coverage, &counts, trend);

        let mut recommendations = Vec::new();
        match baseline {
            None => recommendations.push(
                "No requirements baseline yet: upload and analyze a PRD before judging scope".to_string(),
            ),
            Some(b) => {
                if !b.metadata().structure_recognized {
                    recommendations.push(
                        "The PRD has no recognizable requirement sections: add headings such as \"Functional Requirements\" and re-analyze"
                            .to_string(),
                    );
                }
                if summary.scope_compliance < self.config.compliance_warning_pct {
                    recommendations.push(format!(
                        "Scope compliance is {:.1}%: review pending change requests and out-of-scope tasks",
                        summary.scope_compliance
                    ));
                }
                if coverage < self.config.coverage_warning_pct {
                    recommendations.push(format!(
                        "Requirements coverage is {coverage:.1}%: run auto-association or plan tasks for uncovered requirements"
                    ));
                }
            }
        }
        if counts.pending > 0 {
            recommendations.push(format!(
                "{} change request(s) awaiting decision",
                counts.pending
            ));
        }
        if trend == ChangeRequestTrend::Increasing {
            recommendations.push("Change requests are increasing: scope may be drifting".to_string());
        }

        ScopeHealth {
            has_baseline: baseline.is_some(),
            risk_level,
            change_request_trend: trend,
            recommendations,
            change_requests: counts,
            requirements_coverage: coverage,
            scope_compliance: summary.scope_compliance,
        }
    }

    /// Compute the task scope report
    #[must_use]
    pub fn task_report(&self, baseline: Option<&RequirementBaseline>, tasks: &[TaskRecord]) -> TaskScopeReport {
        let summary = TaskScopeSummary::compute(tasks);
        let coverage = baseline.map(|b| RequirementsCoverage::compute(b, tasks));
        let out_of_scope: Vec<String> = tasks
            .iter()
            .filter(|t| t.last_scope_check().is_some_and(|c| !c.in_scope))
            .map(|t| t.id.clone())
            .collect();

        let mut recommendations = Vec::new();
        if baseline.is_none() {
            recommendations.push(Recommendation::new(
                Priority::High,
                "Analyze a PRD to create the requirements baseline",
            ));
        }
        if !out_of_scope.is_empty() {
            recommendations.push(Recommendation::new(
                Priority::High,
                format!(
                    "{} task(s) are out of scope: approve their change requests or revise them",
                    out_of_scope.len()
                ),
            ));
        }
        if summary.scope_compliance < self.config.compliance_warning_pct {
            recommendations.push(Recommendation::new(
                Priority::High,
                format!("Scope compliance is {:.1}%", summary.scope_compliance),
            ));
        }
        if let Some(cov) = &coverage {
            if cov.coverage < self.config.coverage_warning_pct {
                recommendations.push(Recommendation::new(
                    Priority::Medium,
                    format!(
                        "{} of {} requirements have no associated task: run auto-association",
                        cov.uncovered_requirement_ids.len(),
                        cov.total_requirements
                    ),
                ));
            }
        }
        let unchecked = summary.total_tasks - summary.tasks_with_scope_check;
        if unchecked > 0 {
            recommendations.push(Recommendation::new(
                Priority::Low,
                format!("{unchecked} task(s) have never been scope-checked"),
            ));
        }

        TaskScopeReport {
            summary,
            requirements_coverage: coverage,
            out_of_scope_task_ids: out_of_scope,
            recommendations,
        }
    }

    /// Compare filing volume of the latest window against the one before it
    #[must_use]
    pub fn trend(&self, requests: &[ChangeRequest], now: DateTime<Utc>) -> ChangeRequestTrend {
        let window = self.config.trend_window();
        let recent_start = now - window;
        let prior_start = recent_start - window;

        let mut recent = 0;
        let mut prior = 0;
        for cr in requests {
            if cr.requested_at > recent_start && cr.requested_at <= now {
                recent += 1;
            } else if cr.requested_at > prior_start && cr.requested_at <= recent_start {
                prior += 1;
            }
        }
        ChangeRequestTrend::compare(recent, prior, self.config.trend_tolerance)
    }

    fn risk_level(
        &self,
        has_baseline: bool,
        compliance: f64,
        coverage: f64,
        counts: &StatusCounts,
        trend: ChangeRequestTrend,
    ) -> RiskLevel {
        if !has_baseline {
            return RiskLevel::Medium;
        }
        if compliance < HIGH_RISK_COMPLIANCE_PCT || counts.pending >= HIGH_RISK_PENDING {
            return RiskLevel::High;
        }
        if compliance < self.config.compliance_warning_pct
            || counts.pending > 0
            || trend == ChangeRequestTrend::Increasing
            || coverage < self.config.coverage_warning_pct
        {
            return RiskLevel::Medium;
        }
        RiskLevel::Low
    }
}

/// Percentage rounded to two decimals, `empty` when the denominator is zero
fn percent(part: usize, whole: usize, empty: f64) -> f64 {
    if whole == 0 {
        return empty;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use scope_baseline::BaselineExtractor;
    use scope_model::{
        ChangeRequestStatus, ChangeRequestType, Impact, ProjectId, ScopeCheckResult, TaskOperation,
    };

    fn baseline() -> RequirementBaseline {
        BaselineExtractor::new().extract(
            &ProjectId::new("health").unwrap(),
            "## Functional Requirements\n\n- Create tasks\n- Edit tasks\n- Delete tasks\n- Archive tasks\n",
            "prd.md",
            Utc::now(),
        )
    }

    fn checked(id: &str, in_scope: bool, matched: &[&str]) -> TaskRecord {
        let mut task = TaskRecord::new(id, id, "");
        let ext = task.extension_mut();
        ext.matched_requirement_ids = matched.iter().map(|s| (*s).to_string()).collect();
        ext.scope_check = Some(ScopeCheckResult {
            in_scope,
            confidence: 0.9,
            risk_level: if in_scope { RiskLevel::Low } else { RiskLevel::High },
            matched_requirement_ids: Vec::new(),
            reasoning: String::new(),
            checked_at: Utc::now(),
            operation: TaskOperation::Add,
            categories: Vec::new(),
        });
        task
    }

    fn request(status: ChangeRequestStatus, at: DateTime<Utc>) -> ChangeRequest {
        ChangeRequest {
            id: format!("CR-{}", at.timestamp_nanos_opt().unwrap_or_default()),
            kind: ChangeRequestType::ScopeExpansion,
            title: "x".to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            impact: Impact::Medium,
            related_tasks: Vec::new(),
            related_requirements: Vec::new(),
            requested_by: "system".to_string(),
            assigned_to: None,
            estimated_effort: None,
            reason: "x".to_string(),
            requested_at: at,
            updated_at: at,
            history: Vec::new(),
        }
    }

    #[test]
    fn no_baseline_is_medium_risk_with_advice() {
        let reporter = HealthReporter::new(&ScopeConfig::default());
        let health = reporter.health(None, &[], &[], Utc::now());
        assert!(!health.has_baseline);
        assert_eq!(health.risk_level, RiskLevel::Medium);
        assert!((health.scope_compliance - 100.0).abs() < f64::EPSILON);
        assert!(health.requirements_coverage.abs() < f64::EPSILON);
        assert!(health.recommendations[0].contains("analyze a PRD"));
    }

    #[test]
    fn coverage_and_compliance_percentages() {
        let baseline = baseline();
        let ids: Vec<&str> = baseline.requirements().iter().map(|r| r.id.as_str()).collect();
        let tasks = vec![
            checked("a", true, &[ids[0]]),
            checked("b", true, &[ids[0], ids[1]]),
            checked("c", true, &[ids[2]]),
            checked("d", false, &[]),
        ];
        let reporter = HealthReporter::new(&ScopeConfig::default());
        let health = reporter.health(Some(&baseline), &tasks, &[], Utc::now());

        assert!((health.requirements_coverage - 75.0).abs() < f64::EPSILON);
        assert!((health.scope_compliance - 75.0).abs() < f64::EPSILON);
        assert_eq!(health.risk_level, RiskLevel::Low);

        let report = reporter.task_report(Some(&baseline), &tasks);
        assert_eq!(report.summary.tasks_with_requirements, 3);
        assert_eq!(report.summary.tasks_with_scope_check, 4);
        assert_eq!(report.out_of_scope_task_ids, vec!["d".to_string()]);
        let coverage = report.requirements_coverage.unwrap();
        assert_eq!(coverage.uncovered_requirement_ids, vec![ids[3].to_string()]);
    }

    #[test]
    fn unchecked_tasks_count_against_compliance() {
        let mut tasks = vec![checked("a", true, &[])];
        tasks.extend((0..3).map(|i| TaskRecord::new(format!("u{i}"), "unchecked", "")));
        let summary = TaskScopeSummary::compute(&tasks);
        assert_eq!(summary.total_tasks, 4);
        assert_eq!(summary.tasks_with_scope_check, 1);
        assert!((summary.scope_compliance - 25.0).abs() < f64::EPSILON);

        let reporter = HealthReporter::new(&ScopeConfig::default());
        let health = reporter.health(Some(&baseline()), &tasks, &[], Utc::now());
        assert_eq!(health.risk_level, RiskLevel::High);

        let empty = TaskScopeSummary::compute(&[]);
        assert!((empty.scope_compliance - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn low_compliance_and_pending_backlog_are_high_risk() {
        let baseline = baseline();
        let reporter = HealthReporter::new(&ScopeConfig::default());
        let tasks = vec![checked("a", false, &[]), checked("b", false, &[]), checked("c", true, &[])];
        let health = reporter.health(Some(&baseline), &tasks, &[], Utc::now());
        assert_eq!(health.risk_level, RiskLevel::High);

        let now = Utc::now();
        let backlog: Vec<_> = (0..5)
            .map(|i| request(ChangeRequestStatus::Pending, now - Duration::days(20 + i)))
            .collect();
        let health = reporter.health(Some(&baseline), &[], &backlog, now);
        assert_eq!(health.change_requests.pending, 5);
        assert_eq!(health.risk_level, RiskLevel::High);
    }

    #[test]
    fn trend_compares_adjacent_windows() {
        let reporter = HealthReporter::new(&ScopeConfig::default());
        let now = Utc::now();
        let rising: Vec<_> = [1, 2, 3]
            .iter()
            .map(|d| request(ChangeRequestStatus::Pending, now - Duration::days(*d)))
            .collect();
        assert_eq!(reporter.trend(&rising, now), ChangeRequestTrend::Increasing);

        let falling: Vec<_> = [8, 9, 10]
            .iter()
            .map(|d| request(ChangeRequestStatus::Rejected, now - Duration::days(*d)))
            .collect();
        assert_eq!(reporter.trend(&falling, now), ChangeRequestTrend::Decreasing);

        let old = vec![request(ChangeRequestStatus::Implemented, now - Duration::days(40))];
        assert_eq!(reporter.trend(&old, now), ChangeRequestTrend::Stable);
    }

    #[test]
    fn report_without_baseline_omits_coverage() {
        let reporter = HealthReporter::new(&ScopeConfig::default());
        let report = reporter.task_report(None, &[TaskRecord::new("t1", "Anything", "")]);
        assert!(report.requirements_coverage.is_none());
        assert_eq!(report.recommendations[0].priority, Priority::High);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["totalTasks"], 1);
        assert!(json.get("requirementsCoverage").is_none());
    }
}
