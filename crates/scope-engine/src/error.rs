//! Error types for the scope engine
//!
//! Every public operation returns [`ScopeError`]. Variants map onto the
//! status codes a REST host would answer with.

use scope_model::{IdError, TransitionError};
use scope_store::StoreError;
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Malformed input; nothing was written
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown project, baseline, task, change request or document
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Request conflicts with current state, which is left unchanged
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store backend failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A document exists but could not be read
    #[error("failed to read document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScopeError {
    /// Create a validation error
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error
    #[inline]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// HTTP-equivalent status code
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Store(_) | Self::Document { .. } => 500,
        }
    }

    /// Whether the caller, not the engine, is at fault
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Check if retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Io { .. }) | Self::Document { .. }
        )
    }
}

impl From<TransitionError> for ScopeError {
    fn from(err: TransitionError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<IdError> for ScopeError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for engine operations
pub type ScopeResult<T> = Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use scope_model::{ChangeRequestStatus, TransitionAction};

    #[test]
    fn status_codes() {
        assert_eq!(ScopeError::validation("x").status_code(), 400);
        assert_eq!(ScopeError::not_found("change request", "CR-1").status_code(), 404);
        let corrupt = ScopeError::Store(StoreError::Corrupt {
            path: "scope/baseline.json".into(),
            reason: "counts disagree".to_string(),
        });
        assert_eq!(corrupt.status_code(), 500);
        assert!(ScopeError::validation("x").is_client_error());
        assert!(!corrupt.is_client_error());
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn transition_errors_become_conflicts() {
        let err: ScopeError = TransitionError {
            from: ChangeRequestStatus::Rejected,
            action: TransitionAction::Approve,
        }
        .into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            err.to_string(),
            "conflict: cannot approve a change request that is rejected"
        );
    }

    #[test]
    fn not_found_names_the_missing_id() {
        let err = ScopeError::not_found("task", "t-42");
        assert_eq!(err.to_string(), "task not found: t-42");
        assert!(!err.is_retryable());
    }
}
