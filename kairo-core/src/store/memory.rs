use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::modules::ModuleId;
use crate::store::TenantStore;
use crate::tenant::{Registration, RegistrationApplication, RegistrationState, TenantId};

#[derive(Debug, Clone, Default)]
struct TenantRecord {
    registration: Registration,
    modules: BTreeSet<String>,
    settings: HashMap<ModuleId, Value>,
}

/// In-memory store for tests and for running without a database.
#[derive(Clone, Default)]
pub struct MemoryTenantStore {
    tenants: Arc<RwLock<HashMap<TenantId, TenantRecord>>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tenant with raw module keys. Unknown keys are kept as-is,
    /// which is how legacy rows look to the resolver.
    pub fn insert_raw<I, S>(&self, tenant: TenantId, state: RegistrationState, modules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tenants = self.tenants.write();
        let record = tenants.entry(tenant).or_default();
        record.registration.state = state;
        record.modules = modules.into_iter().map(Into::into).collect();
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn get_registration_state(&self, tenant: TenantId) -> Result<Option<RegistrationState>> {
        Ok(self.tenants.read().get(&tenant).map(|r| r.registration.state))
    }

    async fn set_registration_state(
        &self,
        tenant: TenantId,
        state: RegistrationState,
        reason: Option<String>,
    ) -> Result<()> {
        let mut tenants = self.tenants.write();
        let record = tenants.entry(tenant).or_default();
        record.registration.state = state;
        record.registration.reason = reason;
        Ok(())
    }

    async fn get_enabled_modules(&self, tenant: TenantId) -> Result<BTreeSet<String>> {
        Ok(self
            .tenants
            .read()
            .get(&tenant)
            .map(|r| r.modules.clone())
            .unwrap_or_default())
    }

    async fn set_module_enabled(&self, tenant: TenantId, module: ModuleId, enabled: bool) -> Result<()> {
        let mut tenants = self.tenants.write();
        let record = tenants.entry(tenant).or_default();
        if enabled {
            record.modules.insert(module.as_str().to_string());
        } else {
            record.modules.remove(module.as_str());
        }
        Ok(())
    }

    async fn ensure_tenant(&self, tenant: TenantId) -> Result<bool> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant) {
            return Ok(false);
        }
        tenants.insert(tenant, TenantRecord::default());
        Ok(true)
    }

    async fn get_registration(&self, tenant: TenantId) -> Result<Option<Registration>> {
        Ok(self.tenants.read().get(&tenant).map(|r| r.registration.clone()))
    }

    async fn save_application(&self, tenant: TenantId, application: RegistrationApplication) -> Result<()> {
        let mut tenants = self.tenants.write();
        tenants.entry(tenant).or_default().registration.application = Some(application);
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantId>> {
        let mut ids: Vec<_> = self.tenants.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_module_settings(&self, tenant: TenantId, module: ModuleId) -> Result<Option<Value>> {
        Ok(self
            .tenants
            .read()
            .get(&tenant)
            .and_then(|r| r.settings.get(&module).cloned()))
    }

    async fn set_module_settings(&self, tenant: TenantId, module: ModuleId, settings: Value) -> Result<()> {
        let mut tenants = self.tenants.write();
        tenants.entry(tenant).or_default().settings.insert(module, settings);
        Ok(())
    }
}
