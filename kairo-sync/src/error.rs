use kairo_core::{RegistrationState, TenantId};
use thiserror::Error;

use crate::types::ScopeKey;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for lifecycle operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures while reconciling one command tree.
///
/// Every variant is scoped to the tree it came from; none of them
/// say anything about other scopes.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Remote registry unavailable for {scope}: {cause}")]
    RemoteUnavailable { scope: ScopeKey, cause: String },

    #[error("Tenant store error: {0}")]
    Store(String),

    #[error("Guild {0} is the privileged guild and is only synced as such")]
    PrivilegedScope(TenantId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn remote(scope: ScopeKey, cause: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            scope,
            cause: cause.into(),
        }
    }

    /// Store failures come through as `anyhow` from kairo-core.
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }
}

/// Lifecycle event outcomes.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("Unknown module: {0}")]
    InvalidModuleId(String),

    #[error("Registration cannot move from {from} to {to}")]
    InvalidTransition {
        from: RegistrationState,
        to: RegistrationState,
    },

    #[error("Tenant store error: {0}")]
    Store(String),

    /// State was persisted but the command tree did not follow.
    #[error("Command sync failed: {0}")]
    Sync(#[from] SyncError),
}

impl DispatchError {
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }

    /// True when the change was saved and only the sync failed.
    /// A later resync converges without repeating the change.
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Sync(_))
    }
}
