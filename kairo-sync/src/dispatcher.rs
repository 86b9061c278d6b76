use std::collections::BTreeSet;
use std::sync::Arc;

use kairo_core::{
    resolve, GatewaySettings, ModuleId, RegistrationApplication, RegistrationState, TenantId, TenantStore,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DispatchError, DispatchResult, SyncError};
use crate::syncer::CommandRegistrySyncer;
use crate::types::{ReconcileReport, TenantInspection};

/// Turns tenant lifecycle events into state changes and syncs.
///
/// Each mutating call persists first and syncs second. A state check
/// and its write share the guild's sync lock, released before the sync
/// takes it again. A sync failure after a good persist comes back as
/// [`DispatchError::Sync`]; the new state stays and the next sync
/// converges.
#[derive(Clone)]
pub struct LifecycleDispatcher {
    syncer: Arc<CommandRegistrySyncer>,
    default_modules: Arc<[ModuleId]>,
    max_concurrency: usize,
}

impl LifecycleDispatcher {
    pub fn new(syncer: Arc<CommandRegistrySyncer>, default_modules: Vec<ModuleId>, max_concurrency: usize) -> Self {
        Self {
            syncer,
            default_modules: default_modules.into(),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn from_settings(syncer: Arc<CommandRegistrySyncer>, settings: &GatewaySettings) -> Self {
        Self::new(syncer, settings.default_modules.clone(), settings.sync_max_concurrency)
    }

    pub fn syncer(&self) -> &Arc<CommandRegistrySyncer> {
        &self.syncer
    }

    fn store(&self) -> &dyn TenantStore {
        self.syncer.store().as_ref()
    }

    async fn current_state(&self, tenant: TenantId) -> DispatchResult<RegistrationState> {
        self.store()
            .get_registration_state(tenant)
            .await
            .map(Option::unwrap_or_default)
            .map_err(DispatchError::store)
    }

    /// A guild added the bot.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn on_tenant_join(&self, tenant: TenantId) -> DispatchResult<usize> {
        if tenant == self.syncer.admin_guild() {
            info!("joined the privileged guild");
            return Ok(self.syncer.sync_privileged().await?);
        }

        let created = self.store().ensure_tenant(tenant).await.map_err(DispatchError::store)?;
        info!(created, "tenant joined");
        Ok(self.syncer.sync_tenant(tenant).await?)
    }

    /// A guild removed the bot. Stored data is kept for a rejoin.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub fn on_tenant_leave(&self, tenant: TenantId) {
        let dropped = self.syncer.locks().forget(tenant);
        info!(lock_dropped = dropped, "tenant left");
    }

    #[instrument(skip(self, application), fields(tenant = %tenant))]
    pub async fn on_registration_submit(
        &self,
        tenant: TenantId,
        application: RegistrationApplication,
    ) -> DispatchResult<usize> {
        {
            let lock = self.syncer.locks().lock_for(tenant);
            let _guard = lock.lock().await;

            let from = self.current_state(tenant).await?;
            if !from.accepts_application() {
                warn!(%from, "registration submitted in the wrong state");
                return Err(DispatchError::InvalidTransition {
                    from,
                    to: RegistrationState::Pending,
                });
            }

            self.store()
                .save_application(tenant, application)
                .await
                .map_err(DispatchError::store)?;
            self.persist_state(tenant, RegistrationState::Pending, None).await?;
        }
        info!("registration submitted");
        Ok(self.syncer.sync_tenant(tenant).await?)
    }

    /// The tenant answered a request for more information.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn on_info_response(&self, tenant: TenantId) -> DispatchResult<usize> {
        {
            let lock = self.syncer.locks().lock_for(tenant);
            let _guard = lock.lock().await;

            let from = self.current_state(tenant).await?;
            if from != RegistrationState::NeedsMoreInfo {
                warn!(%from, "info response without an open request");
                return Err(DispatchError::InvalidTransition {
                    from,
                    to: RegistrationState::Pending,
                });
            }

            self.persist_state(tenant, RegistrationState::Pending, None).await?;
        }
        info!("info response received");
        Ok(self.syncer.sync_tenant(tenant).await?)
    }

    /// An admin decided on a registration.
    ///
    /// Decisions are allowed from any state. The reason is kept only for
    /// declines and info requests.
    #[instrument(skip(self, reason), fields(tenant = %tenant, decision = %decision))]
    pub async fn on_approval_decision(
        &self,
        tenant: TenantId,
        decision: RegistrationState,
        reason: Option<String>,
    ) -> DispatchResult<usize> {
        let reason = match decision {
            RegistrationState::Approved => None,
            RegistrationState::Declined | RegistrationState::NeedsMoreInfo => reason,
            RegistrationState::None | RegistrationState::Pending => {
                let from = self.current_state(tenant).await?;
                return Err(DispatchError::InvalidTransition { from, to: decision });
            }
        };

        self.persist_state(tenant, decision, reason).await?;
        if decision == RegistrationState::Approved {
            for module in self.default_modules.iter() {
                self.store()
                    .set_module_enabled(tenant, *module, true)
                    .await
                    .map_err(DispatchError::store)?;
            }
            debug!(modules = self.default_modules.len(), "default modules enabled");
        }
        info!("registration decided");
        Ok(self.syncer.sync_tenant(tenant).await?)
    }

    /// Switch a module on or off. Unknown keys are rejected before
    /// anything is written.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn on_module_toggle(&self, tenant: TenantId, module: &str, enabled: bool) -> DispatchResult<usize> {
        let Some(module) = ModuleId::parse(module) else {
            warn!(module, "unknown module key");
            return Err(DispatchError::InvalidModuleId(module.to_string()));
        };

        self.store()
            .set_module_enabled(tenant, module, enabled)
            .await
            .map_err(DispatchError::store)?;
        info!(%module, enabled, "module toggled");
        Ok(self.syncer.sync_tenant(tenant).await?)
    }

    /// Privileged sync, then every stored tenant.
    ///
    /// A failed privileged sync is reported and the tenant pass still runs.
    #[instrument(skip(self))]
    pub async fn on_startup_reconcile_all(&self) -> DispatchResult<ReconcileReport> {
        let privileged = self.syncer.sync_privileged().await;
        if let Err(err) = &privileged {
            error!(error = %err, "privileged sync failed; continuing with tenants");
        }

        let tenants = self.store().list_tenants().await.map_err(DispatchError::store)?;
        let mut report = self.reconcile(tenants).await;
        report.privileged = Some(privileged);
        Ok(report)
    }

    /// Sync the given tenants concurrently, at most `max_concurrency`
    /// at a time. The privileged guild is skipped.
    #[instrument(skip(self, tenants))]
    pub async fn reconcile<I>(&self, tenants: I) -> ReconcileReport
    where
        I: IntoIterator<Item = TenantId>,
    {
        let admin = self.syncer.admin_guild();
        let mut report = ReconcileReport::default();
        let mut pending = BTreeSet::new();

        for tenant in tenants {
            if tenant == admin {
                debug!(%tenant, "skipping privileged guild in tenant pass");
                if !report.skipped.contains(&tenant) {
                    report.skipped.push(tenant);
                }
            } else {
                pending.insert(tenant);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for &tenant in &pending {
            let syncer = self.syncer.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => syncer.sync_tenant(tenant).await,
                    Err(_) => Err(SyncError::Internal("reconcile semaphore closed".to_string())),
                };
                (tenant, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((tenant, Ok(_))) => {
                    pending.remove(&tenant);
                    report.succeeded.push(tenant);
                }
                Ok((tenant, Err(err))) => {
                    pending.remove(&tenant);
                    warn!(%tenant, error = %err, "tenant sync failed");
                    report.failed.push((tenant, err));
                }
                Err(err) => error!(error = %err, "reconcile task did not finish"),
            }
        }
        for tenant in pending {
            report
                .failed
                .push((tenant, SyncError::Internal("sync task did not finish".to_string())));
        }

        report.succeeded.sort();
        report.failed.sort_by_key(|(id, _)| *id);
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "tenant reconcile finished"
        );
        report
    }

    /// Current state and visible commands for one tenant.
    pub async fn inspect(&self, tenant: TenantId) -> DispatchResult<TenantInspection> {
        let registration = self
            .store()
            .get_registration(tenant)
            .await
            .map_err(DispatchError::store)?;
        let enabled_modules = self
            .store()
            .get_enabled_modules(tenant)
            .await
            .map_err(DispatchError::store)?;

        let recorded = registration.is_some();
        let registration = registration.unwrap_or_default();
        let state = recorded.then_some(registration.state);

        Ok(TenantInspection {
            tenant,
            recorded,
            state: registration.state,
            reason: registration.reason,
            application: registration.application,
            visible_commands: resolve(state, &enabled_modules),
            enabled_modules,
        })
    }

    /// Visible command names for one tenant.
    pub async fn resolve(&self, tenant: TenantId) -> DispatchResult<Vec<&'static str>> {
        kairo_core::resolve_tenant(self.store(), tenant)
            .await
            .map_err(DispatchError::store)
    }

    async fn persist_state(
        &self,
        tenant: TenantId,
        state: RegistrationState,
        reason: Option<String>,
    ) -> DispatchResult<()> {
        self.store()
            .set_registration_state(tenant, state, reason)
            .await
            .map_err(DispatchError::store)
    }
}
