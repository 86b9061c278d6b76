//! # kairo-sync: command registry synchronization
//!
//! Keeps each guild's command tree in the remote registry equal to what
//! its tenant state allows.
//!
//! - [`CommandRegistrySyncer`] rebuilds one tree at a time under a
//!   per-guild lock: compute the visible set, then replace the tree.
//! - [`LifecycleDispatcher`] turns join, registration, approval and
//!   module events into persisted state plus a sync, and runs the
//!   startup reconcile across every stored tenant.
//! - [`RemoteRegistry`] is the seam to the registry itself, with an
//!   in-memory implementation for tests and an HTTP one behind the
//!   `http` feature.
//!
//! ```rust
//! use std::sync::Arc;
//! use kairo_sync::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryTenantStore::new();
//! let registry = MemoryRegistry::new();
//! let syncer = CommandRegistrySyncer::new(
//!     Arc::new(store.clone()),
//!     Arc::new(registry.clone()),
//!     Arc::new(CommandRegistry::builtin()),
//!     TenantId(1),
//! );
//! let dispatcher = LifecycleDispatcher::new(Arc::new(syncer), ModuleId::ALL.to_vec(), 8);
//!
//! dispatcher.on_tenant_join(TenantId(42)).await.unwrap();
//! assert_eq!(registry.commands(ScopeKey::Guild(TenantId(42))), vec!["register"]);
//! # });
//! ```

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod locks;
pub mod observability;
pub mod syncer;
pub mod types;

pub use backend::memory::{JournalEntry, MemoryRegistry, RegistryOp};
pub use backend::{BoxStream, RemoteRegistry};
pub use dispatcher::LifecycleDispatcher;
pub use error::{DispatchError, DispatchResult, SyncError, SyncResult};
pub use locks::ScopeLocks;
pub use observability::{MetricsSnapshot, SyncMetrics};
pub use syncer::CommandRegistrySyncer;
pub use types::{ReconcileReport, ScopeKey, SyncEvent, TenantInspection};

#[cfg(feature = "http")]
pub use backend::http::HttpRegistry;

pub mod prelude {
    pub use crate::{
        CommandRegistrySyncer, DispatchError, LifecycleDispatcher, MemoryRegistry, ReconcileReport, RemoteRegistry,
        ScopeKey, SyncError, SyncEvent,
    };

    pub use kairo_core::{CommandRegistry, MemoryTenantStore, ModuleId, RegistrationState, TenantId, TenantStore};

    pub use async_trait::async_trait;
}
