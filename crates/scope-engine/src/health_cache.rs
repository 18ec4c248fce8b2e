//! Short-lived health cache using moka
//!
//! Health is recomputed from the stores on demand; this cache only absorbs
//! bursts of dashboard reads. Entries expire after the configured TTL and
//! every mutation on a project invalidates its entry.

use crate::health::ScopeHealthReport;
use moka::future::Cache;
use scope_model::ProjectId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CAPACITY: u64 = 1_024;

/// Per-project cache of health reports
#[derive(Debug, Clone)]
pub struct HealthCache {
    inner: Cache<ProjectId, Arc<ScopeHealthReport>>,
}

impl HealthCache {
    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    #[inline]
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_ttl(DEFAULT_CAPACITY, ttl)
    }

    #[inline]
    pub async fn get(&self, project: &ProjectId) -> Option<Arc<ScopeHealthReport>> {
        self.inner.get(project).await
    }

    /// Get or compute the report; failures are not cached
    pub async fn try_get_or_insert_with<E, F, Fut>(
        &self,
        project: &ProjectId,
        f: F,
    ) -> Result<Arc<ScopeHealthReport>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ScopeHealthReport, E>>,
    {
        if let Some(cached) = self.inner.get(project).await {
            return Ok(cached);
        }

        let report = Arc::new(f().await?);
        self.inner.insert(project.clone(), Arc::clone(&report)).await;
        Ok(report)
    }

    /// Drop the project's entry
    #[inline]
    pub async fn invalidate(&self, project: &ProjectId) {
        self.inner.invalidate(project).await;
    }
}
