//! Scope Engine - PRD scope governance
//!
//! The engine that:
//! - Judges tasks against the requirement baseline extracted from a PRD
//! - Files change requests when a task leaves the agreed scope
//! - Links existing tasks to requirements in bulk
//! - Reports coverage, compliance and change-request trends
//!
//! All state goes through injected stores (see `scope_store`), so the
//! engine runs the same over JSON files or in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_engine::{ScopeConfig, ScopeEngine, ScopeStores};
//! use scope_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! store.create_project(&project);
//! let engine = ScopeEngine::new(ScopeConfig::new(), ScopeStores::shared(store))?;
//!
//! engine.analyze_prd(&project, prd_text, "prd.md", false).await?;
//! let outcome = engine.on_task_mutation(&project, "task-1", TaskOperation::Add).await;
//! for warning in &outcome.warnings {
//!     println!("{}", warning.message);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod association;
pub mod change_requests;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod health_cache;
pub mod loader;
pub mod service;

// Re-exports for convenience
pub use association::{AssociationEngine, AssociationOutcome, AssociationPlan};
pub use change_requests::{ChangeRequestManager, ChangeRequestUpdate, Filing, NewChangeRequest};
pub use classifier::{should_auto_file, RequirementMatch, ScopeClassifier, TaskProfile};
pub use config::ScopeConfig;
pub use engine::{AnalysisOutcome, ScopeEngine, ScopeStores, ScopeWarning, TaskMutationOutcome};
pub use error::{ScopeError, ScopeResult};
pub use health::{
    HealthReporter, OpenChangeRequests, RequirementsCoverage, ScopeHealthReport, TaskScopeReport,
    TaskScopeSummary,
};
pub use health_cache::HealthCache;
pub use loader::{DocumentLoader, FsDocumentLoader, LoadedDocument};
pub use service::{
    AnalyzePrdRequest, AnalyzePrdResponse, CheckTaskScopeRequest, ScopeService, TransitionRequest,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosting the scope engine
    pub use crate::{
        ScopeConfig, ScopeEngine, ScopeError, ScopeResult, ScopeService, ScopeStores,
        TaskMutationOutcome,
    };
    pub use scope_model::{ProjectId, TaskDraft, TaskOperation, TransitionAction};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
