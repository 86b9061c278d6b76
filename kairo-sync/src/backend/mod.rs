pub mod memory;

#[cfg(feature = "http")]
pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use kairo_core::{CommandDefinition, TenantId};

use crate::SyncResult;

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// The remote command registry.
///
/// Scoped calls address one guild's tree. Implementations report any
/// transport or remote failure as `SyncError::RemoteUnavailable`.
#[async_trait]
pub trait RemoteRegistry: Send + Sync {
    /// Names currently installed in a guild's tree.
    async fn list_scoped_commands(&self, scope: TenantId) -> SyncResult<Vec<String>>;

    /// Remove every command from a guild's tree.
    async fn clear_scoped_commands(&self, scope: TenantId) -> SyncResult<()>;

    /// Install definitions into a guild's tree; returns how many landed.
    async fn install_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize>;

    /// Make a guild's tree exactly `defs`; returns how many landed.
    ///
    /// Registries that can overwrite a tree in one call should override
    /// this. The fallback clears first, so a failed install leaves the
    /// tree empty until the next sync.
    async fn replace_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize> {
        self.clear_scoped_commands(scope).await?;
        self.install_scoped_commands(scope, defs).await
    }

    /// Remove every command from the unscoped tree.
    async fn clear_global_commands(&self) -> SyncResult<()>;

    async fn list_global_commands(&self) -> SyncResult<Vec<String>>;
}
