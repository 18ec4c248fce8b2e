//! Association engine
//!
//! Links existing tasks to baseline requirements in bulk. Planning is pure;
//! the engine writes the planned task updates under the project's
//! task-annotation lock.

use crate::classifier::{ScopeClassifier, TaskProfile};
use chrono::{DateTime, Utc};
use scope_model::{RequirementBaseline, TaskRecord};
use serde::{Deserialize, Serialize};

/// Improvement needed before an existing association is replaced
const STRENGTHEN_EPSILON: f64 = 1e-6;

/// Result of one association run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationOutcome {
    pub total_tasks: usize,
    /// Tasks that gained their first association in this run
    pub associated_tasks: usize,
    /// Tasks that were already associated before the run
    pub already_associated: usize,
    /// Already-associated tasks whose match improved
    pub strengthened_tasks: usize,
}

/// Planned task writes plus the counts they produce
#[derive(Debug, Clone, Default)]
pub struct AssociationPlan {
    pub updates: Vec<TaskRecord>,
    pub outcome: AssociationOutcome,
}

/// Bulk task-to-requirement matcher
#[derive(Debug, Clone)]
pub struct AssociationEngine {
    classifier: ScopeClassifier,
}

impl AssociationEngine {
    #[must_use]
    pub fn new(classifier: ScopeClassifier) -> Self {
        Self { classifier }
    }

    /// Plan associations for `tasks` against `baseline`
    #[must_use]
    pub fn plan(&self, tasks: &[TaskRecord], baseline: &RequirementBaseline, now: DateTime<Utc>) -> AssociationPlan {
        let mut plan = AssociationPlan {
            outcome: AssociationOutcome {
                total_tasks: tasks.len(),
                ..AssociationOutcome::default()
            },
            updates: Vec::new(),
        };

        for task in tasks {
            let already = task.is_associated();
            if already {
                plan.outcome.already_associated += 1;
            }

            let matches = self.classifier.rank(&TaskProfile::new(&task.draft()), baseline);
            let Some(best) = matches.first() else {
                continue;
            };

            let previous = task
                .scope_extension
                .as_ref()
                .and_then(|ext| ext.association_confidence)
                .unwrap_or(0.0);
            let improves = best.score > previous + STRENGTHEN_EPSILON;
            if already && !improves {
                continue;
            }

            let mut updated = task.clone();
            let ext = updated.extension_mut();
            ext.matched_requirement_ids = matches.iter().map(|m| m.requirement_id.clone()).collect();
            ext.association_confidence = Some(best.score);
            ext.associated_at = Some(now);

            if already {
                plan.outcome.strengthened_tasks += 1;
            } else {
                plan.outcome.associated_tasks += 1;
            }
            plan.updates.push(updated);
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use scope_baseline::BaselineExtractor;
    use scope_model::ProjectId;

    fn baseline(prd: &str) -> RequirementBaseline {
        BaselineExtractor::new().extract(&ProjectId::new("demo").unwrap(), prd, "prd.md", Utc::now())
    }

    fn engine() -> AssociationEngine {
        AssociationEngine::new(ScopeClassifier::new(&ScopeConfig::default()))
    }

    #[test]
    fn fills_gaps_only() {
        let baseline = baseline("## Features\n\n- Create tasks\n- Delete tasks\n");
        let mut linked = TaskRecord::new("t1", "Create tasks quickly", "");
        linked.extension_mut().matched_requirement_ids = vec![baseline.requirements()[0].id.clone()];
        linked.extension_mut().association_confidence = Some(1.0);
        let tasks = vec![
            linked,
            TaskRecord::new("t2", "Delete tasks in bulk", ""),
            TaskRecord::new("t3", "Write quarterly newsletter", ""),
        ];

        let plan = engine().plan(&tasks, &baseline, Utc::now());
        assert_eq!(
            plan.outcome,
            AssociationOutcome {
                total_tasks: 3,
                associated_tasks: 1,
                already_associated: 1,
                strengthened_tasks: 0,
            }
        );
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].id, "t2");
        assert_eq!(plan.updates[0].matched_requirement_ids()[0], baseline.requirements()[1].id);
    }

    #[test]
    fn replanning_applied_updates_is_a_no_op() {
        let baseline = baseline("## Features\n\n- Create tasks\n- Delete tasks\n");
        let mut tasks = vec![
            TaskRecord::new("t1", "Create tasks", ""),
            TaskRecord::new("t2", "Delete tasks", ""),
        ];
        let first = engine().plan(&tasks, &baseline, Utc::now());
        assert_eq!(first.outcome.associated_tasks, 2);
        tasks = first.updates;

        let second = engine().plan(&tasks, &baseline, Utc::now());
        assert_eq!(second.outcome.associated_tasks, 0);
        assert_eq!(second.outcome.strengthened_tasks, 0);
        assert!(second.updates.is_empty());
    }

    #[test]
    fn weaker_associations_are_strengthened() {
        let baseline = baseline("## Features\n\n- Create tasks\n");
        let mut task = TaskRecord::new("t1", "Create tasks", "");
        task.extension_mut().matched_requirement_ids = vec!["REQ-999-stale000".to_string()];
        task.extension_mut().association_confidence = Some(0.2);

        let plan = engine().plan(&[task], &baseline, Utc::now());
        assert_eq!(plan.outcome.strengthened_tasks, 1);
        assert_eq!(plan.updates[0].matched_requirement_ids(), &[baseline.requirements()[0].id.clone()]);
    }
}
