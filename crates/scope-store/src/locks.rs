//! Per-project, per-resource mutual exclusion
//!
//! Check-and-create sequences (change-request dedup, baseline replace,
//! annotation writes) hold the matching guard across their whole
//! read-modify-write. Different projects never contend.

use dashmap::DashMap;
use scope_model::ProjectId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Kind of per-project state a lock protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Baseline,
    ChangeRequests,
    TaskAnnotations,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Baseline => "baseline",
            Resource::ChangeRequests => "change-requests",
            Resource::TaskAnnotations => "task-annotations",
        };
        f.write_str(name)
    }
}

/// Registry of async mutexes keyed by project and resource
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: DashMap<(ProjectId, Resource), Arc<Mutex<()>>>,
}

impl ProjectLocks {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, project: &ProjectId, resource: Resource) -> Arc<Mutex<()>> {
        // The shard guard is released before any await
        self.locks
            .entry((project.clone(), resource))
            .or_default()
            .clone()
    }

    /// Wait for exclusive access to `resource` of `project`
    pub async fn lock(&self, project: &ProjectId, resource: Resource) -> OwnedMutexGuard<()> {
        let handle = self.handle(project, resource);
        let guard = handle.lock_owned().await;
        tracing::trace!(project = %project, %resource, "acquired project lock");
        guard
    }

    /// Number of lock slots created so far
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
