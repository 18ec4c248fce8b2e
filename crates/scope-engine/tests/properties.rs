//! Idempotence, determinism and bounds of the scope engine

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use scope_baseline::BaselineExtractor;
use scope_engine::{ScopeClassifier, ScopeConfig};
use scope_model::{ProjectId, RequirementBaseline, TaskDraft, TaskOperation};
use scope_test_utils::{TestProject, FREEFORM_PRD, NOTES_APP_PRD, TASK_MANAGEMENT_PRD};

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn baseline(prd: &str) -> RequirementBaseline {
    BaselineExtractor::new().extract(&ProjectId::new("props").unwrap(), prd, "prd.md", fixed_time())
}

#[tokio::test]
async fn reanalysis_of_unchanged_prd_is_a_no_op() {
    let t = TestProject::new("idem");
    let first = t.analyze(TASK_MANAGEMENT_PRD).await.unwrap();
    let second = t.analyze(TASK_MANAGEMENT_PRD).await.unwrap();

    assert!(!first.unchanged);
    assert!(second.unchanged);
    assert_eq!(first.baseline, second.baseline);

    let ids = |b: &RequirementBaseline| b.requirements().iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    let forced = t
        .engine
        .analyze_prd(&t.project, TASK_MANAGEMENT_PRD, "prd.md", true)
        .await
        .unwrap();
    assert_eq!(ids(&forced.baseline), ids(&first.baseline));
    assert_eq!(forced.baseline.metadata().total_requirements, first.baseline.metadata().total_requirements);
    assert!(forced.baseline.counts_consistent());
}

#[tokio::test]
async fn changed_prd_replaces_the_baseline() {
    let t = TestProject::new("replace");
    let first = t.analyze(TASK_MANAGEMENT_PRD).await.unwrap();
    let second = t.analyze(NOTES_APP_PRD).await.unwrap();
    assert!(!second.unchanged);
    assert_ne!(
        first.baseline.metadata().prd_source_hash,
        second.baseline.metadata().prd_source_hash
    );
    assert_eq!(second.baseline.metadata().document_title.as_deref(), Some("Notes App"));
    assert_eq!(second.baseline.metadata().optional_requirements, 1);
}

#[tokio::test]
async fn unstructured_prd_never_blocks_tasks() {
    let t = TestProject::new("freeform");
    let outcome = t.analyze(FREEFORM_PRD).await.unwrap();
    assert!(outcome.baseline.is_empty());
    assert!(!outcome.baseline.metadata().structure_recognized);
    assert!(!outcome.baseline.metadata().warnings.is_empty());

    let result = t
        .engine
        .check_task_scope(&t.project, &TaskDraft::new("Add payments", "Stripe checkout"), TaskOperation::Add)
        .await
        .unwrap();
    assert!(result.in_scope);
    assert!(result.confidence.abs() < f64::EPSILON);
}

#[tokio::test]
async fn empty_task_titles_are_rejected() {
    let t = TestProject::new("validation");
    let err = t
        .engine
        .check_task_scope(&t.project, &TaskDraft::new("  ", "body"), TaskOperation::Add)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

fn task_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{0,60}",
        "[\u{4e00}-\u{4e80}]{0,20}",
        Just("添加用户登录系统".to_string()),
        Just("实现任务创建功能".to_string()),
        Just("Export reports to PDF".to_string()),
    ]
}

proptest! {
    #[test]
    fn confidence_is_always_bounded(title in task_text(), description in task_text()) {
        let classifier = ScopeClassifier::new(&ScopeConfig::default());
        let draft = TaskDraft::new(title, description);
        for prd in [TASK_MANAGEMENT_PRD, NOTES_APP_PRD, FREEFORM_PRD] {
            let baseline = baseline(prd);
            let result = classifier.classify(&draft, TaskOperation::Add, Some(&baseline), fixed_time());
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            prop_assert!(!result.reasoning.is_empty());
            prop_assert!(result.matched_requirement_ids.len() <= ScopeConfig::default().max_matched_requirements);
        }
    }

    #[test]
    fn classification_is_deterministic(title in task_text(), description in task_text()) {
        let baseline = baseline(TASK_MANAGEMENT_PRD);
        let draft = TaskDraft::new(title, description);
        let first = ScopeClassifier::new(&ScopeConfig::default())
            .classify(&draft, TaskOperation::Update, Some(&baseline), fixed_time());
        let second = ScopeClassifier::new(&ScopeConfig::default())
            .classify(&draft, TaskOperation::Update, Some(&baseline), fixed_time());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn no_baseline_means_in_scope_with_zero_confidence(title in task_text(), description in task_text()) {
        let classifier = ScopeClassifier::new(&ScopeConfig::default());
        let result = classifier.classify(&TaskDraft::new(title, description), TaskOperation::Add, None, fixed_time());
        prop_assert!(result.in_scope);
        prop_assert_eq!(result.confidence, 0.0);
        prop_assert!(result.matched_requirement_ids.is_empty());
    }
}
