//! Engine configuration
//!
//! Thresholds are tunable; defaults are calibrated so a task restating a
//! functional requirement lands well above the high threshold while a task
//! introducing an unrelated capability stays below the floor.

use crate::error::{ScopeError, ScopeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Scope engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Minimum similarity for a requirement to count as matched
    pub similarity_floor: f64,
    /// Similarity at which a match is considered strong
    pub high_match_threshold: f64,
    /// Out-of-scope confidence that files a change request even at medium risk
    pub auto_file_confidence: f64,
    /// Cap on `matchedRequirementIds`
    pub max_matched_requirements: usize,
    /// Length of each change-request trend window
    pub trend_window_days: u32,
    /// Count difference still considered a stable trend
    pub trend_tolerance: usize,
    /// Scope compliance (percent) below which health warns
    pub compliance_warning_pct: f64,
    /// Requirements coverage (percent) below which health warns
    pub coverage_warning_pct: f64,
    /// Lifetime of cached health results
    pub health_cache_ttl_ms: u64,
    /// Identity recorded on auto-filed change requests
    pub system_actor: String,
}

impl ScopeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] for malformed TOML or invalid values
    pub fn from_toml_str(text: &str) -> ScopeResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ScopeError::validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    ///
    /// # Errors
    /// Returns [`ScopeError::NotFound`] for a missing file,
    /// [`ScopeError::Document`] for unreadable files and
    /// [`ScopeError::Validation`] for bad contents
    pub fn load(path: impl AsRef<Path>) -> ScopeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ScopeError::not_found("config", path.display().to_string())
            } else {
                ScopeError::Document {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_toml_str(&text)
    }

    /// Check thresholds are coherent
    ///
    /// # Errors
    /// Returns [`ScopeError::Validation`] naming the first bad setting
    pub fn validate(&self) -> ScopeResult<()> {
        for (name, value) in [
            ("similarity_floor", self.similarity_floor),
            ("high_match_threshold", self.high_match_threshold),
            ("auto_file_confidence", self.auto_file_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScopeError::validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.similarity_floor > self.high_match_threshold {
            return Err(ScopeError::validation(format!(
                "similarity_floor ({}) exceeds high_match_threshold ({})",
                self.similarity_floor, self.high_match_threshold
            )));
        }
        for (name, value) in [
            ("compliance_warning_pct", self.compliance_warning_pct),
            ("coverage_warning_pct", self.coverage_warning_pct),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ScopeError::validation(format!(
                    "{name} must be within [0, 100], got {value}"
                )));
            }
        }
        if self.max_matched_requirements == 0 {
            return Err(ScopeError::validation("max_matched_requirements must be positive"));
        }
        if self.trend_window_days == 0 {
            return Err(ScopeError::validation("trend_window_days must be positive"));
        }
        if self.system_actor.trim().is_empty() {
            return Err(ScopeError::validation("system_actor must not be empty"));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        self.similarity_floor = floor;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_high_match_threshold(mut self, threshold: f64) -> Self {
        self.high_match_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_auto_file_confidence(mut self, confidence: f64) -> Self {
        self.auto_file_confidence = confidence;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_trend_window_days(mut self, days: u32) -> Self {
        self.trend_window_days = days;
        self
    }

    /// With health cache lifetime
    #[inline]
    #[must_use]
    pub fn with_health_cache_ttl(mut self, ttl: Duration) -> Self {
        self.health_cache_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_system_actor(mut self, actor: impl Into<String>) -> Self {
        self.system_actor = actor.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn health_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.health_cache_ttl_ms)
    }

    #[inline]
    #[must_use]
    pub fn trend_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.trend_window_days))
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.15,
            high_match_threshold: 0.5,
            auto_file_confidence: 0.85,
            max_matched_requirements: 5,
            trend_window_days: 7,
            trend_tolerance: 1,
            compliance_warning_pct: 70.0,
            coverage_warning_pct: 50.0,
            health_cache_ttl_ms: 500,
            system_actor: "system".to_string(),
        }
    }
}
