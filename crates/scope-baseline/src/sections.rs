//! PRD section recognition
//!
//! Maps headings (and heading-like plain lines) to the section kinds that
//! decide a requirement's default scope.

use once_cell::sync::Lazy;
use regex::Regex;
use scope_model::RequirementScope;

/// Kind of a recognized PRD section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Functional,
    NonFunctional,
    Constraint,
    Future,
    /// Explicit non-goals; items are never requirements
    Excluded,
}

impl SectionKind {
    /// Scope given to items under this section before qualifiers apply
    #[must_use]
    pub fn default_scope(&self) -> Option<RequirementScope> {
        match self {
            SectionKind::Functional => Some(RequirementScope::Core),
            SectionKind::NonFunctional | SectionKind::Constraint => Some(RequirementScope::Extended),
            SectionKind::Future => Some(RequirementScope::Optional),
            SectionKind::Excluded => None,
        }
    }
}

// Checked in order: "非功能需求" contains "功能需求", "technical requirements"
// contains "requirements".
const SECTION_LABELS: &[(SectionKind, &[&str])] = &[
    (
        SectionKind::Excluded,
        &["非目标", "不在范围", "范围外", "不包含", "不做", "out of scope", "non-goals", "non goals", "not in scope"],
    ),
    (
        SectionKind::NonFunctional,
        &[
            "非功能", "性能需求", "质量属性", "质量要求", "安全需求", "non-functional",
            "nonfunctional", "non functional", "quality attributes", "performance requirements",
            "security requirements",
        ],
    ),
    (
        SectionKind::Constraint,
        &[
            "技术约束", "约束", "限制条件", "技术要求", "技术栈", "技术选型", "technical constraints",
            "constraints", "technical requirements", "tech stack",
        ],
    ),
    (
        SectionKind::Future,
        &[
            "未来", "后续规划", "二期", "可选功能", "future", "optional features", "nice to have",
            "roadmap",
        ],
    ),
    (
        SectionKind::Functional,
        &[
            "功能需求", "功能列表", "核心功能", "功能模块", "功能说明", "主要功能", "功能特性", "功能",
            "用户故事", "需求列表", "functional requirements", "functional", "features",
            "feature list", "user stories", "requirements",
        ],
    ),
];

/// Longest plain line still considered a section label
const MAX_LABEL_CHARS: usize = 30;

static NUMBERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:第[一二三四五六七八九十百\d]+[章节部分篇]|[一二三四五六七八九十]+[、.．]|[(（][一二三四五六七八九十\d]+[)）]|\d+(?:\.\d+)*(?:[.、．)）]\s*|\s+))\s*",
    )
    .expect("static numbering pattern")
});

static CHINESE_CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:第[一二三四五六七八九十百\d]+[章节部分篇]|[一二三四五六七八九十]+、)")
        .expect("static chapter pattern")
});

static ENUMERATED_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•·●▪]|\d+[.、．)）]|[(（]\d+[)）]|[a-zA-Z][.)])\s*(\S.*)$")
        .expect("static item pattern")
});

/// Strip leading outline numbering (`2.1 `, `一、`, `（3）`, `第二章`)
#[must_use]
pub fn strip_numbering(text: &str) -> &str {
    match NUMBERING.find(text) {
        Some(m) if m.end() < text.len() => text[m.end()..].trim(),
        _ => text.trim(),
    }
}

fn normalize(text: &str) -> String {
    strip_numbering(text)
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase()
}

/// Classify a heading; `None` for sections that hold no requirements
#[must_use]
pub fn classify_heading(text: &str) -> Option<SectionKind> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    SECTION_LABELS
        .iter()
        .find(|(_, labels)| labels.iter().any(|l| normalized.contains(l)))
        .map(|(kind, _)| *kind)
}

/// Words that may follow a label on a standalone label line (`功能需求`, `Features list`)
const LABEL_SUFFIXES: &[&str] = &["需求", "要求", "列表", "说明", "requirements", "list"];

/// A standalone line naming a section (`功能需求：`, `Features:`)
///
/// Unlike headings, the whole line has to be a label word, optionally
/// followed by one generic suffix; prose mentioning a label is not a label.
#[must_use]
pub fn label_line(text: &str) -> Option<SectionKind> {
    let normalized = normalize(text);
    if normalized.is_empty() || normalized.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    SECTION_LABELS
        .iter()
        .find(|(_, labels)| labels.iter().any(|l| is_label_with_suffix(&normalized, l)))
        .map(|(kind, _)| *kind)
}

fn is_label_with_suffix(normalized: &str, label: &str) -> bool {
    normalized.strip_prefix(label).is_some_and(|rest| {
        let rest = rest.trim();
        rest.is_empty() || LABEL_SUFFIXES.contains(&rest)
    })
}

/// Plain line that reads like a chapter heading (`二、业务流程`)
#[must_use]
pub fn is_chapter_line(text: &str) -> bool {
    CHINESE_CHAPTER.is_match(text) && text.chars().count() <= MAX_LABEL_CHARS
}

/// Body of an enumerated plain line (`1、任务创建`, `• Export`)
#[must_use]
pub fn enumerated_item(text: &str) -> Option<&str> {
    ENUMERATED_ITEM
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_and_english_labels() {
        assert_eq!(classify_heading("功能需求"), Some(SectionKind::Functional));
        assert_eq!(classify_heading("2. 非功能需求"), Some(SectionKind::NonFunctional));
        assert_eq!(classify_heading("三、技术约束"), Some(SectionKind::Constraint));
        assert_eq!(classify_heading("Functional Requirements"), Some(SectionKind::Functional));
        assert_eq!(classify_heading("Technical Requirements"), Some(SectionKind::Constraint));
        assert_eq!(classify_heading("Future Work"), Some(SectionKind::Future));
        assert_eq!(classify_heading("Non-Goals"), Some(SectionKind::Excluded));
        assert_eq!(classify_heading("项目背景"), None);
    }

    #[test]
    fn numbering_is_stripped() {
        assert_eq!(strip_numbering("2.1 任务创建"), "任务创建");
        assert_eq!(strip_numbering("一、功能需求"), "功能需求");
        assert_eq!(strip_numbering("（3）导出"), "导出");
        assert_eq!(strip_numbering("2FA 支持"), "2FA 支持");
    }

    #[test]
    fn label_lines() {
        assert_eq!(label_line("功能需求："), Some(SectionKind::Functional));
        assert_eq!(label_line("Non-functional requirements:"), Some(SectionKind::NonFunctional));
        assert_eq!(label_line("核心功能：用户可以创建任务"), None);
        assert_eq!(label_line("本系统的功能需要覆盖从创建到归档的全部任务生命周期管理流程"), None);
        assert_eq!(label_line("2. 核心功能"), Some(SectionKind::Functional));
        assert_eq!(label_line("Features list"), Some(SectionKind::Functional));
        assert_eq!(label_line("未来三个月完成上线"), None);
        assert_eq!(label_line("Our features are great"), None);
        assert_eq!(label_line("性能要求很高"), None);
    }

    #[test]
    fn enumerations() {
        assert_eq!(enumerated_item("1、任务创建"), Some("任务创建"));
        assert_eq!(enumerated_item("（2）任务编辑"), Some("任务编辑"));
        assert_eq!(enumerated_item("• Export CSV"), Some("Export CSV"));
        assert_eq!(enumerated_item("2秒内完成"), None);
        assert!(is_chapter_line("二、业务流程"));
        assert!(!is_chapter_line("任务创建"));
    }

    #[test]
    fn default_scopes() {
        assert_eq!(SectionKind::Functional.default_scope(), Some(RequirementScope::Core));
        assert_eq!(SectionKind::Constraint.default_scope(), Some(RequirementScope::Extended));
        assert_eq!(SectionKind::Excluded.default_scope(), None);
    }
}
