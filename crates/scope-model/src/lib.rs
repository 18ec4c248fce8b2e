//! Scope Model
//!
//! Records owned (or annotated) by the PRD scope governance engine.
//!
//! # Core Concepts
//!
//! - [`RequirementBaseline`]: requirements extracted from a PRD, with derived metadata
//! - [`ScopeCheckResult`]: verdict for a task against a baseline
//! - [`ChangeRequest`]: proposal to expand or modify scope, with a guarded lifecycle
//! - [`ScopeHealth`]: aggregated project metrics
//! - [`ContentHash`]: Blake3 hash used for change detection and fingerprints

#![warn(unreachable_pub)]
#![allow(missing_docs)]

#[macro_use]
mod labels;

mod change_request;
mod hash;
mod health;
mod ids;
mod requirement;
mod task;

pub use change_request::{
    ChangeRequest, ChangeRequestFilter, ChangeRequestStats, ChangeRequestStatus,
    ChangeRequestType, StatusChange, StatusCounts, TransitionAction, TransitionError,
};
pub use hash::{ContentHash, HashError};
pub use health::{ChangeRequestTrend, Recommendation, ScopeHealth};
pub use ids::{new_change_request_id, IdError, ProjectId};
pub use labels::{Impact, LabelError, Priority, RequirementScope, RiskLevel, TaskOperation};
pub use requirement::{BaselineMetadata, BaselineSource, Requirement, RequirementBaseline};
pub use task::{ScopeCheckResult, ScopeExtension, TaskDraft, TaskRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
