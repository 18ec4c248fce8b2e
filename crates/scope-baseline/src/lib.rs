//! Scope Baseline
//!
//! The boundary between free-text PRDs and the structured requirement
//! baseline the scope engine judges tasks against.
//!
//! # Pipeline
//!
//! ```text
//! PRD text → PrdOutline (pulldown-cmark) → section walk → candidates → RequirementBaseline
//!                                             ↑
//!                                 sections + lexicon (scope, priority, category)
//! ```
//!
//! The [`text`] module provides the tokenizer shared with the classifier,
//! so requirement text and task text are normalized the same way.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_baseline::BaselineExtractor;
//!
//! let baseline = BaselineExtractor::new().extract(&project, prd_text, "prd.md", Utc::now());
//! assert!(baseline.counts_consistent());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod extractor;
pub mod lexicon;
pub mod outline;
pub mod sections;
pub mod text;

pub use extractor::{requirement_id, BaselineExtractor, EMPTY_SECTIONS_WARNING, UNSTRUCTURED_WARNING};
pub use lexicon::{detect_categories, Category, GENERAL_CATEGORY};
pub use outline::{Block, PrdOutline};
pub use sections::SectionKind;
pub use text::{tokenize, TokenSet};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::DateTime;
    use proptest::prelude::*;
    use scope_model::ProjectId;

    proptest! {
        #[test]
        fn extraction_is_total_and_consistent(text in "\\PC{0,400}") {
            let project = ProjectId::new("prop").unwrap();
            let at = DateTime::from_timestamp(0, 0).unwrap();
            let baseline = BaselineExtractor::new().extract(&project, &text, "prd.md", at);
            prop_assert!(baseline.counts_consistent());
            let again = BaselineExtractor::new().extract(&project, &text, "prd.md", at);
            prop_assert_eq!(baseline, again);
        }

        #[test]
        fn bullet_lists_always_yield_requirements(items in proptest::collection::vec("[a-z]{3,12}( [a-z]{3,12}){0,3}", 1..8)) {
            let body: String = items.iter().map(|i| format!("- {i}\n")).collect();
            let prd = format!("## Functional Requirements\n\n{body}");
            let project = ProjectId::new("prop").unwrap();
            let at = DateTime::from_timestamp(0, 0).unwrap();
            let baseline = BaselineExtractor::new().extract(&project, &prd, "prd.md", at);
            prop_assert_eq!(baseline.len(), items.len());
        }
    }
}
