//! Identifiers
//!
//! Projects are addressed by caller-supplied names; change requests get
//! ULID-based identifiers so listings sort by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Project identifier
///
/// Used as a directory name by file-backed stores, so path separators and
/// relative components are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a validated project id
    ///
    /// # Errors
    /// Returns [`IdError`] when the id is empty or not a single path segment
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\'])
            || trimmed.chars().any(char::is_control)
        {
            return Err(IdError::InvalidProjectId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProjectId> for String {
    fn from(value: ProjectId) -> Self {
        value.0
    }
}

/// Generate a new change request id (`CR-<ulid>`)
#[inline]
#[must_use]
pub fn new_change_request_id() -> String {
    format!("CR-{}", Ulid::new())
}

/// Identifier validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty identifier
    #[error("identifier must not be empty")]
    Empty,

    /// Project id is not a single path segment
    #[error("invalid project id: '{0}'")]
    InvalidProjectId(String),
}
