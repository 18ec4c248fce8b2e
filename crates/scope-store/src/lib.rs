//! Scope Store
//!
//! Explicit, injected storage handles for per-project scope state.
//!
//! # Overview
//!
//! - [`BaselineStore`], [`ChangeRequestStore`], [`TaskStore`]: async contracts
//! - [`ProjectLocks`]: per-project, per-resource mutexes for read-modify-write
//! - [`MemoryStore`]: in-process implementation of every contract
//! - [`JsonFileStore`]: JSON documents under a data directory, atomic writes
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_store::{BaselineStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.put_baseline(&baseline).await?;
//! assert!(store.get_baseline(baseline.project_id()).await?.is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod json;
pub mod locks;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use json::JsonFileStore;
pub use locks::{ProjectLocks, Resource};
pub use memory::MemoryStore;
pub use traits::{BaselineStore, ChangeRequestStore, TaskStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
