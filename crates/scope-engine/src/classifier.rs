//! Scope classifier
//!
//! Scores a task against every requirement of a baseline with normalized
//! token overlap and turns the best score into a verdict. Everything here is
//! pure: the same task, baseline and thresholds always give the same result.
//!
//! Similarity of a task `T` to a requirement `R` (title tokens `Rt`):
//!
//! ```text
//! coverage = |Rt matched in T| / |Rt|
//! dice     = 2 · min(|T matched in R|, |R matched in T|) / (|T| + |R|)
//! score    = 0.6 · coverage + 0.4 · dice
//! ```

use crate::config::ScopeConfig;
use chrono::{DateTime, Utc};
use scope_baseline::lexicon::detect_categories;
use scope_baseline::TokenSet;
use scope_model::{
    Requirement, RequirementBaseline, RiskLevel, ScopeCheckResult, TaskDraft, TaskOperation,
};
use std::collections::BTreeSet;

const TITLE_WEIGHT: f64 = 0.6;
const DICE_WEIGHT: f64 = 0.4;
const MAX_REASON_KEYWORDS: usize = 6;

/// One requirement scored against a task
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementMatch {
    pub requirement_id: String,
    pub title: String,
    pub score: f64,
    /// Task keywords shared with the requirement
    pub shared_keywords: Vec<String>,
}

/// Tokenized task text
#[derive(Debug, Clone)]
pub struct TaskProfile {
    tokens: TokenSet,
    categories: Vec<&'static str>,
    expanding_categories: Vec<&'static str>,
}

impl TaskProfile {
    #[must_use]
    pub fn new(draft: &TaskDraft) -> Self {
        let text = draft.text();
        let detected = detect_categories(&text);
        Self {
            tokens: TokenSet::from_text(&text),
            categories: detected.iter().map(|c| c.name).collect(),
            expanding_categories: detected
                .iter()
                .filter(|c| c.expands_scope)
                .map(|c| c.name)
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn categories(&self) -> &[&'static str] {
        &self.categories
    }
}

/// Round to four decimals so reported numbers stay readable
#[inline]
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn similarity(task: &TaskProfile, title: &TokenSet, full: &TokenSet) -> (f64, Vec<String>) {
    if task.tokens.is_empty() || full.is_empty() {
        return (0.0, Vec::new());
    }

    let coverage = if title.is_empty() {
        0.0
    } else {
        title.iter().filter(|t| task.tokens.contains_match(t)).count() as f64 / title.len() as f64
    };

    let shared = task.tokens.shared_with(full);
    let from_requirement = full.iter().filter(|t| task.tokens.contains_match(t)).count();
    let overlap = shared.len().min(from_requirement);
    let dice = 2.0 * overlap as f64 / (task.tokens.len() + full.len()) as f64;

    let score = (TITLE_WEIGHT * coverage + DICE_WEIGHT * dice).clamp(0.0, 1.0);
    (score, shared.into_iter().map(str::to_string).collect())
}

/// Stateless scorer holding its thresholds
#[derive(Debug, Clone)]
pub struct ScopeClassifier {
    floor: f64,
    high: f64,
    max_matches: usize,
}

impl ScopeClassifier {
    #[must_use]
    pub fn new(config: &ScopeConfig) -> Self {
        Self {
            floor: config.similarity_floor,
            high: config.high_match_threshold,
            max_matches: config.max_matched_requirements,
        }
    }

    /// Similarity of a task to one requirement, in [0, 1]
    #[must_use]
    pub fn score(&self, task: &TaskProfile, requirement: &Requirement) -> f64 {
        let title = TokenSet::from_text(&requirement.title);
        let full = TokenSet::from_text(&requirement.text());
        similarity(task, &title, &full).0
    }

    /// Requirements at or above the floor, best first (ties keep baseline order)
    #[must_use]
    pub fn rank(&self, task: &TaskProfile, baseline: &RequirementBaseline) -> Vec<RequirementMatch> {
        self.score_all(task, baseline)
            .into_iter()
            .filter(|m| m.score >= self.floor)
            .take(self.max_matches)
            .collect()
    }

    /// Every requirement scored, best first
    fn score_all(&self, task: &TaskProfile, baseline: &RequirementBaseline) -> Vec<RequirementMatch> {
        let mut scored: Vec<RequirementMatch> = baseline
            .requirements()
            .iter()
            .map(|requirement| {
                let title = TokenSet::from_text(&requirement.title);
                let full = TokenSet::from_text(&requirement.text());
                let (score, shared_keywords) = similarity(task, &title, &full);
                RequirementMatch {
                    requirement_id: requirement.id.clone(),
                    title: requirement.title.clone(),
                    score: round4(score),
                    shared_keywords,
                }
            })
            .collect();
        // Stable sort keeps baseline order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// Judge a task against a baseline
    #[must_use]
    pub fn classify(
        &self,
        draft: &TaskDraft,
        operation: TaskOperation,
        baseline: Option<&RequirementBaseline>,
        checked_at: DateTime<Utc>,
    ) -> ScopeCheckResult {
        let task = TaskProfile::new(draft);
        let categories = task.categories().iter().map(|c| (*c).to_string()).collect();
        let verdict = |in_scope, confidence: f64, risk_level, matched, reasoning| ScopeCheckResult {
            in_scope,
            confidence: round4(confidence.clamp(0.0, 1.0)),
            risk_level,
            matched_requirement_ids: matched,
            reasoning,
            checked_at,
            operation,
            categories,
        };

        let Some(baseline) = baseline.filter(|b| !b.is_empty()) else {
            return verdict(
                true,
                0.0,
                RiskLevel::Low,
                Vec::new(),
                "No requirement baseline exists for this project, so scope cannot be judged; \
                 the task is allowed."
                    .to_string(),
            );
        };

        let scored = self.score_all(&task, baseline);
        let best_score = scored.first().map_or(0.0, |m| m.score);
        let matched: Vec<RequirementMatch> = scored
            .into_iter()
            .filter(|m| m.score >= self.floor)
            .take(self.max_matches)
            .collect();
        let matched_ids = matched.iter().map(|m| m.requirement_id.clone()).collect();

        if let Some(best) = matched.first() {
            let keywords = describe_keywords(&best.shared_keywords);
            if best.score >= self.high {
                let reasoning = format!(
                    "Matches requirement {} \"{}\" with similarity {:.2} (>= {:.2}){keywords}.",
                    best.requirement_id, best.title, best.score, self.high
                );
                return verdict(true, best.score, RiskLevel::Low, matched_ids, reasoning);
            }
            let reasoning = format!(
                "Partial match: closest requirement {} \"{}\" has similarity {:.2}, between {:.2} and {:.2}{keywords}; \
                 confirm the task stays within it.",
                best.requirement_id, best.title, best.score, self.floor, self.high
            );
            return verdict(true, best.score, RiskLevel::Medium, matched_ids, reasoning);
        }

        let baseline_categories = baseline.categories();
        let foreign: BTreeSet<&str> = task
            .expanding_categories
            .iter()
            .copied()
            .filter(|c| !baseline_categories.contains(c))
            .collect();

        if foreign.is_empty() {
            let reasoning = format!(
                "No requirement matches this task (best similarity {best_score:.2} < {:.2}); \
                 it may extend the baseline scope.",
                self.floor
            );
            return verdict(false, 0.5 * (1.0 - best_score), RiskLevel::Medium, matched_ids, reasoning);
        }

        let reasoning = format!(
            "No requirement matches this task (best similarity {best_score:.2} < {:.2}) and it introduces \
             categories absent from the baseline: {}.",
            self.floor,
            foreign.into_iter().collect::<Vec<_>>().join(", ")
        );
        verdict(false, 1.0 - best_score, RiskLevel::High, matched_ids, reasoning)
    }
}

fn describe_keywords(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return String::new();
    }
    let shown: Vec<&str> = keywords
        .iter()
        .take(MAX_REASON_KEYWORDS)
        .map(String::as_str)
        .collect();
    format!("; shared keywords: {}", shown.join(", "))
}

/// Whether a verdict should raise a change request
#[inline]
#[must_use]
pub fn should_auto_file(result: &ScopeCheckResult, config: &ScopeConfig) -> bool {
    !result.in_scope
        && (result.risk_level == RiskLevel::High || result.confidence >= config.auto_file_confidence)
}
