pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::modules::ModuleId;
use crate::tenant::{Registration, RegistrationApplication, RegistrationState, TenantId};

pub use memory::MemoryTenantStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTenantStore;

/// Persistent per-tenant state.
///
/// Implementations must give read-your-writes consistency for a single
/// tenant id. Nothing here spans tenants except `list_tenants`.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// `None` when the tenant has never been recorded.
    async fn get_registration_state(&self, tenant: TenantId) -> Result<Option<RegistrationState>>;

    /// Set the state. `reason` replaces any previous reason, including with nothing.
    async fn set_registration_state(
        &self,
        tenant: TenantId,
        state: RegistrationState,
        reason: Option<String>,
    ) -> Result<()>;

    /// Raw module keys switched on for the tenant. May include keys
    /// this build no longer knows.
    async fn get_enabled_modules(&self, tenant: TenantId) -> Result<BTreeSet<String>>;

    async fn set_module_enabled(&self, tenant: TenantId, module: ModuleId, enabled: bool) -> Result<()>;

    /// Create a `None`-state record if there is none. Returns true if created.
    async fn ensure_tenant(&self, tenant: TenantId) -> Result<bool>;

    async fn get_registration(&self, tenant: TenantId) -> Result<Option<Registration>>;

    async fn save_application(&self, tenant: TenantId, application: RegistrationApplication) -> Result<()>;

    /// Every recorded tenant, ascending.
    async fn list_tenants(&self) -> Result<Vec<TenantId>>;

    async fn get_module_settings(&self, tenant: TenantId, module: ModuleId) -> Result<Option<Value>>;

    async fn set_module_settings(&self, tenant: TenantId, module: ModuleId, settings: Value) -> Result<()>;
}
