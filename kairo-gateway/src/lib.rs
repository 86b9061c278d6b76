use std::sync::Arc;

use anyhow::Result;
use kairo_core::config::DEFAULT_ENV_PREFIX;
use kairo_core::{CommandRegistry, GatewaySettings, KairoConfig, MemoryTenantStore, TenantStore};
use kairo_sync::{CommandRegistrySyncer, HttpRegistry, LifecycleDispatcher, ReconcileReport, RemoteRegistry};
use tracing::{error, info, warn};

pub struct Gateway {
    pub settings: GatewaySettings,
    pub dispatcher: LifecycleDispatcher,
}

/// Settings from `KAIRO__*` variables and the legacy flat names.
pub fn load_settings() -> Result<GatewaySettings> {
    let mut config = KairoConfig::new();
    config.load_env(DEFAULT_ENV_PREFIX);
    GatewaySettings::from_snapshot(&config.snapshot())
}

pub async fn build() -> Result<Gateway> {
    build_with(load_settings()?).await
}

pub async fn build_with(settings: GatewaySettings) -> Result<Gateway> {
    let store = open_store(&settings).await?;
    let registry: Arc<dyn RemoteRegistry> = Arc::new(HttpRegistry::from_settings(&settings.registry)?);
    Ok(assemble(settings, store, registry))
}

pub fn assemble(settings: GatewaySettings, store: Arc<dyn TenantStore>, registry: Arc<dyn RemoteRegistry>) -> Gateway {
    let syncer = CommandRegistrySyncer::new(
        store,
        registry,
        Arc::new(CommandRegistry::builtin()),
        settings.admin_guild_id,
    );
    let dispatcher = LifecycleDispatcher::from_settings(Arc::new(syncer), &settings);
    Gateway { settings, dispatcher }
}

pub async fn open_store(settings: &GatewaySettings) -> Result<Arc<dyn TenantStore>> {
    match settings.database_url.as_deref() {
        #[cfg(feature = "sqlite")]
        Some(url) => {
            let store = kairo_core::SqliteTenantStore::connect(url).await?;
            info!("tenant store opened");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => {
            warn!("database.url is set but this build has no sqlite support; tenant state will not persist");
            Ok(Arc::new(MemoryTenantStore::new()))
        }
        None => {
            warn!("no database.url configured; tenant state will not persist");
            Ok(Arc::new(MemoryTenantStore::new()))
        }
    }
}

pub fn log_report(report: &ReconcileReport) {
    match &report.privileged {
        Some(Ok(installed)) => info!(installed, "privileged commands synced"),
        Some(Err(err)) => error!(error = %err, "privileged command sync failed"),
        None => {}
    }
    for (tenant, err) in &report.failed {
        error!(%tenant, error = %err, "tenant left unsynced");
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "startup reconcile complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::{RegistrationState, TenantId};
    use kairo_sync::{MemoryRegistry, ScopeKey};
    use tracing_test::traced_test;

    fn settings() -> GatewaySettings {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "500");
        config.set("modules.default", "qa");
        GatewaySettings::from_snapshot(&config.snapshot()).unwrap()
    }

    #[tokio::test]
    #[traced_test]
    async fn memory_store_when_no_database() {
        let store = open_store(&settings()).await.unwrap();
        assert!(store.list_tenants().await.unwrap().is_empty());
        assert!(logs_contain("no database.url configured"));
    }

    #[tokio::test]
    async fn assembled_gateway_reconciles_and_applies_defaults() {
        let store = MemoryTenantStore::new();
        store.insert_raw(TenantId(7), RegistrationState::Pending, Vec::<String>::new());
        let registry = MemoryRegistry::new();
        let gateway = assemble(settings(), Arc::new(store.clone()), Arc::new(registry.clone()));

        let report = gateway.dispatcher.on_startup_reconcile_all().await.unwrap();
        log_report(&report);
        assert!(report.is_clean());
        assert!(!registry.commands(ScopeKey::Guild(TenantId(500))).is_empty());

        gateway
            .dispatcher
            .on_approval_decision(TenantId(7), RegistrationState::Approved, None)
            .await
            .unwrap();
        assert_eq!(registry.commands(ScopeKey::Guild(TenantId(7))).len(), 4);
    }

    #[tokio::test]
    async fn http_registry_needs_credentials() {
        assert!(build_with(settings()).await.is_err());
    }
}
