use std::sync::Arc;

use chrono::Utc;
use kairo_core::{resolve_tenant, CommandRegistry, TenantId, TenantStore};
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use crate::backend::{BoxStream, RemoteRegistry};
use crate::locks::ScopeLocks;
use crate::observability::SyncMetrics;
use crate::types::{ScopeKey, SyncEvent};
use crate::{SyncError, SyncResult};

const EVENT_CAPACITY: usize = 1000;

/// Makes the remote registry agree with tenant state.
///
/// Each sync takes the guild's lock, computes the visible set and
/// replaces the tree with it in one registry call. A failure is scoped
/// to that one guild and is returned as-is; nothing retries.
pub struct CommandRegistrySyncer {
    store: Arc<dyn TenantStore>,
    registry: Arc<dyn RemoteRegistry>,
    catalog: Arc<CommandRegistry>,
    admin_guild: TenantId,
    locks: ScopeLocks,
    metrics: Arc<SyncMetrics>,
    event_broadcaster: broadcast::Sender<SyncEvent>,
}

impl CommandRegistrySyncer {
    pub fn new(
        store: Arc<dyn TenantStore>,
        registry: Arc<dyn RemoteRegistry>,
        catalog: Arc<CommandRegistry>,
        admin_guild: TenantId,
    ) -> Self {
        let (event_broadcaster, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            registry,
            catalog,
            admin_guild,
            locks: ScopeLocks::new(),
            metrics: Arc::new(SyncMetrics::new()),
            event_broadcaster,
        }
    }

    pub fn admin_guild(&self) -> TenantId {
        self.admin_guild
    }

    pub fn store(&self) -> &Arc<dyn TenantStore> {
        &self.store
    }

    pub fn catalog(&self) -> &CommandRegistry {
        &self.catalog
    }

    pub fn locks(&self) -> &ScopeLocks {
        &self.locks
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Subscribe to sync events from this point on.
    pub fn event_stream(&self) -> BoxStream<SyncEvent> {
        let receiver = self.event_broadcaster.subscribe();
        use tokio_stream::{wrappers::BroadcastStream, StreamExt};
        let stream = BroadcastStream::new(receiver).filter_map(|result| result.ok());

        Box::pin(stream)
    }

    /// Rebuild one tenant guild's tree from its stored state.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn sync_tenant(&self, tenant: TenantId) -> SyncResult<usize> {
        if tenant == self.admin_guild {
            warn!("refusing tenant sync for the privileged guild");
            return Err(SyncError::PrivilegedScope(tenant));
        }

        let scope = ScopeKey::Guild(tenant);
        let lock = self.locks.lock_for(tenant);
        let _guard = lock.lock().await;

        self.emit(SyncEvent::Started { scope, at: Utc::now() });
        let result = self.push_tenant(tenant).await;
        self.finish(scope, &result);
        result
    }

    async fn push_tenant(&self, tenant: TenantId) -> SyncResult<usize> {
        let names = resolve_tenant(self.store.as_ref(), tenant)
            .await
            .map_err(SyncError::store)?;
        let defs = self.catalog.tenant_definitions(names.iter().copied());

        self.registry.replace_scoped_commands(tenant, &defs).await
    }

    /// Rebuild the privileged guild's tree, then wipe the global tree.
    ///
    /// The global wipe runs on every call and removes whatever is there.
    #[instrument(skip(self), fields(guild = %self.admin_guild))]
    pub async fn sync_privileged(&self) -> SyncResult<usize> {
        let guild = self.admin_guild;
        let scope = ScopeKey::Guild(guild);
        let lock = self.locks.lock_for(guild);
        let _guard = lock.lock().await;

        self.emit(SyncEvent::Started { scope, at: Utc::now() });
        let result = self.push_privileged(guild).await;
        if result.is_ok() {
            self.metrics.record_privileged();
        }
        self.finish(scope, &result);
        result
    }

    async fn push_privileged(&self, guild: TenantId) -> SyncResult<usize> {
        let defs = self.catalog.privileged_definitions();

        let installed = self.registry.replace_scoped_commands(guild, &defs).await?;

        self.registry.clear_global_commands().await?;
        self.metrics.record_global_clear();
        self.emit(SyncEvent::GlobalCleared { at: Utc::now() });
        info!("global command tree cleared");

        Ok(installed)
    }

    fn finish(&self, scope: ScopeKey, result: &SyncResult<usize>) {
        match result {
            Ok(installed) => {
                self.metrics.record_success(*installed);
                info!(%scope, installed, "commands synced");
                self.emit(SyncEvent::Completed {
                    scope,
                    installed: *installed,
                    at: Utc::now(),
                });
            }
            Err(err) => {
                self.metrics.record_failure();
                error!(%scope, error = %err, "command sync failed");
                self.emit(SyncEvent::Failed {
                    scope,
                    cause: err.to_string(),
                    at: Utc::now(),
                });
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_broadcaster.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryRegistry, RegistryOp};
    use kairo_core::{MemoryTenantStore, RegistrationState};
    use tokio_stream::StreamExt;
    use tracing_test::traced_test;

    const ADMIN: TenantId = TenantId(1);

    fn syncer(store: &MemoryTenantStore, registry: &MemoryRegistry) -> CommandRegistrySyncer {
        CommandRegistrySyncer::new(
            Arc::new(store.clone()),
            Arc::new(registry.clone()),
            Arc::new(CommandRegistry::builtin()),
            ADMIN,
        )
    }

    #[tokio::test]
    async fn tenant_sync_installs_resolved_set() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        store.insert_raw(TenantId(10), RegistrationState::Approved, ["qa", "crypto"]);

        let installed = syncer(&store, &registry).sync_tenant(TenantId(10)).await.unwrap();

        assert_eq!(installed, 6);
        assert_eq!(
            registry.commands(ScopeKey::Guild(TenantId(10))),
            vec!["qa_add", "qa_ask", "qa_scoreboard", "qa_reset", "crypto_encrypt", "crypto_decrypt"]
        );
    }

    #[tokio::test]
    async fn tenant_sync_clears_stale_commands() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        registry.seed(ScopeKey::Guild(TenantId(10)), ["qa_add", "book_add"]);
        store.insert_raw(TenantId(10), RegistrationState::Pending, Vec::<String>::new());

        assert_eq!(syncer(&store, &registry).sync_tenant(TenantId(10)).await.unwrap(), 0);
        assert!(registry.commands(ScopeKey::Guild(TenantId(10))).is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn privileged_guild_is_refused_as_tenant() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();

        let err = syncer(&store, &registry).sync_tenant(ADMIN).await.unwrap_err();

        assert!(matches!(err, SyncError::PrivilegedScope(id) if id == ADMIN));
        assert!(registry.journal().is_empty());
        assert!(logs_contain("refusing tenant sync for the privileged guild"));
    }

    #[tokio::test]
    async fn privileged_sync_installs_admin_set_and_wipes_global() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        registry.seed(ScopeKey::Global, ["stale_global", "register"]);
        let syncer = syncer(&store, &registry);

        let installed = syncer.sync_privileged().await.unwrap();

        assert_eq!(installed, kairo_core::super_admin_commands().len());
        assert!(registry.commands(ScopeKey::Global).is_empty());
        assert_eq!(
            registry.commands(ScopeKey::Guild(ADMIN)),
            kairo_core::super_admin_commands()
        );
        assert_eq!(syncer.metrics().snapshot().global_clears, 1);
        assert_eq!(syncer.metrics().snapshot().privileged_syncs, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn remote_failure_is_logged_with_scope_and_returned() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        registry.fail_next(ScopeKey::Guild(TenantId(4)), RegistryOp::Replace);
        let syncer = syncer(&store, &registry);

        let err = syncer.sync_tenant(TenantId(4)).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteUnavailable { .. }));
        assert!(logs_contain("command sync failed"));
        assert!(logs_contain("guild:4"));
        assert_eq!(syncer.metrics().syncs_failed(), 1);
    }

    #[tokio::test]
    async fn failed_resync_keeps_previous_tree() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        store.insert_raw(TenantId(5), RegistrationState::Approved, ["qa"]);
        let syncer = syncer(&store, &registry);

        syncer.sync_tenant(TenantId(5)).await.unwrap();
        let before = registry.commands(ScopeKey::Guild(TenantId(5)));
        registry.fail_next(ScopeKey::Guild(TenantId(5)), RegistryOp::Replace);

        assert!(syncer.sync_tenant(TenantId(5)).await.is_err());

        assert_eq!(before.len(), 4);
        assert_eq!(registry.commands(ScopeKey::Guild(TenantId(5))), before);
        let ops: Vec<_> = registry.journal().into_iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![RegistryOp::Replace, RegistryOp::Replace]);
    }

    #[tokio::test]
    async fn events_follow_each_sync() {
        let store = MemoryTenantStore::new();
        let registry = MemoryRegistry::new();
        let syncer = syncer(&store, &registry);
        let mut events = syncer.event_stream();

        syncer.sync_tenant(TenantId(3)).await.unwrap();

        let started = events.next().await.unwrap();
        let completed = events.next().await.unwrap();
        assert_eq!(started.event_name(), "started");
        assert!(matches!(
            completed,
            SyncEvent::Completed { scope: ScopeKey::Guild(TenantId(3)), installed: 1, .. }
        ));
    }
}
