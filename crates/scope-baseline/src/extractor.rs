//! Baseline extraction
//!
//! Turns PRD text into a [`RequirementBaseline`]. Extraction is a pure,
//! total function of its inputs: unrecognized structure degrades to a
//! smaller baseline plus warnings, never an error.

use crate::lexicon::{detect_priority, primary_category, qualified_scope, GENERAL_CATEGORY};
use crate::outline::{collapse_ws, Block, PrdOutline};
use crate::sections::{
    classify_heading, enumerated_item, is_chapter_line, label_line, strip_numbering, SectionKind,
};
use chrono::{DateTime, Utc};
use scope_model::{
    BaselineSource, ContentHash, ProjectId, Requirement, RequirementBaseline, RequirementScope,
};

/// Hex characters of the content fingerprint in a requirement id
pub const FINGERPRINT_LEN: usize = 8;

const MAX_LABEL_CHARS: usize = 40;
const MAX_HEADLINE_CHARS: usize = 80;

/// Warning recorded when no PRD section could be recognized
pub const UNSTRUCTURED_WARNING: &str =
    "no recognizable PRD sections; list items were imported as extended requirements";

/// Warning recorded when recognized sections held nothing extractable
pub const EMPTY_SECTIONS_WARNING: &str = "recognized sections contained no requirement items";

/// Requirement id for a position (1-based) and fingerprint
#[must_use]
pub fn requirement_id(position: usize, title: &str, description: &str, scope: RequirementScope) -> String {
    let fingerprint = ContentHash::compute_parts([title, description, scope.as_str()])
        .fingerprint(FINGERPRINT_LEN);
    format!("REQ-{position:03}-{fingerprint}")
}

/// Extracts requirement baselines from PRD text
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineExtractor;

impl BaselineExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract a baseline.
    ///
    /// `source_document` is recorded as each requirement's `extractedFrom`;
    /// `analyzed_at` stamps both the metadata and `createdAt`.
    #[must_use]
    pub fn extract(
        &self,
        project_id: &ProjectId,
        prd_text: &str,
        source_document: &str,
        analyzed_at: DateTime<Utc>,
    ) -> RequirementBaseline {
        let outline = PrdOutline::parse(prd_text);
        let mut walker = Walker::default();
        for block in &outline.blocks {
            walker.visit(block);
        }
        walker.close_pending();

        let mut warnings = Vec::new();
        let candidates = if walker.sections.is_empty() {
            warnings.push(UNSTRUCTURED_WARNING.to_string());
            walker.unsectioned
        } else {
            if walker.candidates.is_empty() {
                warnings.push(EMPTY_SECTIONS_WARNING.to_string());
            }
            walker.candidates
        };

        let requirements: Vec<Requirement> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, c)| c.into_requirement(index + 1, source_document, analyzed_at))
            .collect();

        tracing::debug!(
            project = %project_id,
            requirements = requirements.len(),
            sections = walker.sections.len(),
            "extracted PRD baseline"
        );

        let source = BaselineSource {
            source_document: source_document.to_string(),
            document_title: outline.document_title().map(str::to_string),
            prd_source_hash: ContentHash::compute(prd_text.as_bytes()),
            analyzed_at,
            structure_recognized: !walker.sections.is_empty(),
            sections: walker.sections,
            warnings,
        };
        RequirementBaseline::new(project_id.clone(), requirements, source)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    title: String,
    description: String,
    scope: RequirementScope,
    raw: String,
    /// Enclosing headings and group labels, nearest last
    context: Vec<String>,
}

impl Candidate {
    fn new(text: &str, default_scope: RequirementScope, context: Vec<String>) -> Self {
        let (title, description) = split_item(text);
        Self {
            scope: qualified_scope(text, default_scope),
            raw: text.to_string(),
            title,
            description,
            context,
        }
    }

    fn category(&self) -> &'static str {
        primary_category(&self.title)
            .or_else(|| primary_category(&self.description))
            .or_else(|| self.context.iter().rev().find_map(|c| primary_category(c)))
            .unwrap_or(GENERAL_CATEGORY)
    }

    fn into_requirement(self, position: usize, source: &str, at: DateTime<Utc>) -> Requirement {
        let category = self.category().to_string();
        Requirement {
            id: requirement_id(position, &self.title, &self.description, self.scope),
            priority: detect_priority(&self.raw),
            category,
            title: self.title,
            description: self.description,
            scope: self.scope,
            extracted_from: source.to_string(),
            created_at: at,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    level: u8,
    title: String,
    kind: Option<SectionKind>,
}

/// Unrecognized subheading under a recognized section, waiting to learn
/// whether it owns items
#[derive(Debug, Clone)]
struct PendingHeading {
    level: u8,
    title: String,
    kind: SectionKind,
    context: Vec<String>,
    lines: Vec<String>,
    has_items: bool,
}

#[derive(Debug, Default)]
struct Walker {
    frames: Vec<Frame>,
    groups: Vec<(usize, String)>,
    pending: Option<PendingHeading>,
    last_heading_level: u8,
    sections: Vec<String>,
    candidates: Vec<Candidate>,
    unsectioned: Vec<Candidate>,
}

impl Walker {
    fn visit(&mut self, block: &Block) {
        match block {
            Block::Heading { level, text } => {
                self.last_heading_level = *level;
                self.open_section(*level, text, classify_heading(text));
            }
            Block::Item {
                depth,
                text,
                has_children,
            } => self.visit_item(*depth, text, *has_children),
            Block::Line { text, bold_label } => self.visit_line(text, bold_label.as_deref()),
        }
    }

    fn visit_line(&mut self, text: &str, bold_label: Option<&str>) {
        let synthetic_level = self.last_heading_level.saturating_add(1);
        let label = label_line(text);
        if label.is_some() || is_chapter_line(text) {
            self.open_section(synthetic_level, text, label);
        } else if let Some(body) = enumerated_item(text) {
            self.visit_item(0, body, false);
        } else if bold_label.is_some() && split_label(text).is_some() {
            self.visit_item(0, text, false);
        } else if let Some(pending) = self.pending.as_mut() {
            pending.lines.push(text.to_string());
        }
    }

    fn open_section(&mut self, level: u8, text: &str, recognized: Option<SectionKind>) {
        let title = collapse_ws(strip_numbering(text).trim_end_matches([':', '：']));

        match self.pending.as_ref().map(|p| p.level) {
            // Deeper heading: the pending one is only a grouping
            Some(pending_level) if level > pending_level => self.pending = None,
            Some(_) => self.close_pending(),
            None => {}
        }
        self.groups.clear();
        self.frames.retain(|f| f.level < level);

        let kind = match recognized {
            Some(kind) => {
                self.sections.push(title.clone());
                Some(kind)
            }
            None => {
                let inherited = self.current_kind();
                if let Some(kind) = inherited.filter(|k| *k != SectionKind::Excluded) {
                    self.pending = Some(PendingHeading {
                        level,
                        title: title.clone(),
                        kind,
                        context: self.context(),
                        lines: Vec::new(),
                        has_items: false,
                    });
                }
                inherited
            }
        };

        self.frames.push(Frame { level, title, kind });
    }

    fn visit_item(&mut self, depth: usize, text: &str, has_children: bool) {
        self.groups.retain(|(d, _)| *d < depth);
        if let Some(pending) = self.pending.as_mut() {
            pending.has_items = true;
        }

        let is_group_label = has_children && split_label(text).is_none();
        let context = self.context();
        if has_children {
            self.groups.push((depth, text.to_string()));
        }
        if is_group_label {
            return;
        }

        match self.current_kind() {
            Some(SectionKind::Excluded) => {}
            Some(kind) => {
                if let Some(scope) = kind.default_scope() {
                    self.candidates.push(Candidate::new(text, scope, context));
                }
            }
            None => self
                .unsectioned
                .push(Candidate::new(text, RequirementScope::Extended, context)),
        }
    }

    fn close_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.has_items {
            return;
        }
        let Some(scope) = pending.kind.default_scope() else {
            return;
        };
        let raw = if pending.lines.is_empty() {
            pending.title.clone()
        } else {
            format!("{} {}", pending.title, pending.lines.join(" "))
        };
        self.candidates.push(Candidate {
            scope: qualified_scope(&raw, scope),
            description: pending.lines.join(" "),
            title: pending.title,
            raw,
            context: pending.context,
        });
    }

    fn current_kind(&self) -> Option<SectionKind> {
        self.frames.last().and_then(|f| f.kind)
    }

    fn context(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|f| f.title.clone())
            .chain(self.groups.iter().map(|(_, g)| g.clone()))
            .collect()
    }
}

/// Split `label: detail` (ASCII or full-width colon)
fn split_label(text: &str) -> Option<(String, String)> {
    let (index, colon) = text.char_indices().find(|(_, c)| matches!(c, ':' | '：'))?;
    let label = text[..index].trim().trim_matches(|c| matches!(c, '*' | '[' | ']' | '【' | '】'));
    let detail = text[index + colon.len_utf8()..].trim();
    if label.is_empty() || detail.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    Some((label.trim().to_string(), detail.to_string()))
}

/// First sentence of `text`, capped in length
fn headline(text: &str) -> String {
    let end = text
        .char_indices()
        .find(|(i, c)| matches!(c, '。' | '；' | ';' | '！' | '？') || (*c == '.' && text[i + 1..].starts_with(' ')))
        .map_or(text.len(), |(i, _)| i);
    let sentence = text[..end].trim();
    if sentence.chars().count() > MAX_HEADLINE_CHARS {
        sentence.chars().take(MAX_HEADLINE_CHARS).collect::<String>().trim_end().to_string()
    } else {
        sentence.to_string()
    }
}

fn split_item(text: &str) -> (String, String) {
    if let Some(split) = split_label(text) {
        return split;
    }
    let title = headline(text);
    let description = if title == text { String::new() } else { text.to_string() };
    (title, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TASK_PRD: &str = "# 任务管理系统\n\n\
## 功能需求\n\n\
- 任务创建：用户可以创建新任务\n\
- 任务编辑：用户可以修改任务标题和描述\n\
- 任务删除：用户可以删除不需要的任务\n\
- 任务状态管理：任务支持待办、进行中、已完成状态\n\n\
## 非功能需求\n\n\
- 性能：列表加载时间小于2秒\n\n\
## 技术约束\n\n\
- 使用 Rust 开发\n";

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn extract(text: &str) -> RequirementBaseline {
        BaselineExtractor::new().extract(&ProjectId::new("demo").unwrap(), text, "prd.md", at())
    }

    #[test]
    fn task_prd_sections_and_scopes() {
        let baseline = extract(TASK_PRD);
        let meta = baseline.metadata();

        assert_eq!(meta.total_requirements, 6);
        assert_eq!(meta.core_requirements, 4);
        assert_eq!(meta.extended_requirements, 2);
        assert_eq!(meta.optional_requirements, 0);
        assert!(meta.structure_recognized);
        assert_eq!(meta.sections, vec!["功能需求", "非功能需求", "技术约束"]);
        assert_eq!(meta.document_title.as_deref(), Some("任务管理系统"));
        assert!(meta.warnings.is_empty());

        let first = &baseline.requirements()[0];
        assert_eq!(first.title, "任务创建");
        assert_eq!(first.description, "用户可以创建新任务");
        assert_eq!(first.category, "task-management");
        assert!(first.id.starts_with("REQ-001-"));
        assert_eq!(baseline.requirements()[4].category, "performance");
        assert!(!baseline.categories().contains("authentication"));
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(extract(TASK_PRD), extract(TASK_PRD));
    }

    #[test]
    fn edits_change_the_source_hash() {
        let a = extract(TASK_PRD);
        let b = extract(&format!("{TASK_PRD}- 任务归档\n"));
        assert_ne!(a.metadata().prd_source_hash, b.metadata().prd_source_hash);
        assert_eq!(a.requirements()[0].id, b.requirements()[0].id);
    }

    #[test]
    fn optional_qualifiers_and_future_sections() {
        let baseline = extract(
            "## Functional Requirements\n\n- Export tasks to CSV (nice to have)\n- Create tasks [P0]\n\n\
             ## Future\n\n- Mobile app\n",
        );
        let reqs = baseline.requirements();
        assert_eq!(reqs[0].scope, RequirementScope::Optional);
        assert_eq!(reqs[1].scope, RequirementScope::Core);
        assert_eq!(reqs[1].priority, scope_model::Priority::High);
        assert_eq!(reqs[2].scope, RequirementScope::Optional);
    }

    #[test]
    fn plain_text_label_lines_and_enumerations() {
        let baseline = extract("功能需求：\n1、任务创建\n2、任务编辑\n\n非功能需求：\n1、页面响应时间小于1秒\n");
        let meta = baseline.metadata();
        assert_eq!(meta.core_requirements, 2);
        assert_eq!(meta.extended_requirements, 1);
        assert_eq!(baseline.requirements()[1].title, "任务编辑");
    }

    #[test]
    fn prose_mentioning_a_label_keeps_the_current_section() {
        let baseline = extract(
            "## 非目标\n\n本系统的功能需要覆盖从创建到归档的全部任务生命周期管理流程\n\n- 支持多人实时协作编辑\n",
        );
        assert!(baseline.is_empty());
        assert_eq!(baseline.metadata().sections, vec!["非目标"]);
        assert_eq!(baseline.metadata().warnings, vec![EMPTY_SECTIONS_WARNING.to_string()]);

        let chapters = extract("二、功能需求\n1、任务创建\n三、本系统功能概览\n1、任务归档\n");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters.requirements()[0].title, "任务创建");
        assert_eq!(chapters.requirements()[0].scope, RequirementScope::Core);
        assert_eq!(chapters.metadata().sections, vec!["功能需求"]);
    }

    #[test]
    fn subheadings_without_items_become_requirements() {
        let baseline = extract(
            "## 功能需求\n\n### 任务创建\n\n用户填写标题后保存任务。\n\n### 任务搜索\n\n- 按标题搜索\n- 按状态筛选\n",
        );
        let titles: Vec<_> = baseline.requirements().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["任务创建", "按标题搜索", "按状态筛选"]);
        let created = &baseline.requirements()[0];
        assert_eq!(created.description, "用户填写标题后保存任务。");
        assert_eq!(created.scope, RequirementScope::Core);
        assert_eq!(baseline.requirements()[1].category, "search");
    }

    #[test]
    fn nested_group_labels_provide_context() {
        let baseline = extract("## Features\n\n- Notifications\n  - Daily digest\n  - Mentions digest\n");
        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline.requirements()[0].category, "notification");
    }

    #[test]
    fn other_sections_are_ignored_when_structure_exists() {
        let baseline = extract("## 背景\n\n- 现状说明\n\n## 功能需求\n\n- 任务创建\n\n## Non-Goals\n\n- 支付功能\n");
        assert_eq!(baseline.len(), 1);
        assert_eq!(baseline.requirements()[0].title, "任务创建");
    }

    #[test]
    fn unstructured_prd_degrades_gracefully() {
        let baseline = extract("Some notes\n\n- build a tracker\n- share boards\n");
        let meta = baseline.metadata();
        assert!(!meta.structure_recognized);
        assert_eq!(meta.extended_requirements, 2);
        assert_eq!(meta.warnings, vec![UNSTRUCTURED_WARNING.to_string()]);

        let empty = extract("just prose without any lists");
        assert!(empty.is_empty());
        assert!(!empty.metadata().structure_recognized);
    }

    #[test]
    fn long_items_get_a_headline_title() {
        let (title, description) =
            split_item("Users can filter the board by assignee. Filters persist between sessions.");
        assert_eq!(title, "Users can filter the board by assignee");
        assert!(description.ends_with("sessions."));
    }
}
