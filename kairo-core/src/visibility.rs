//! Which commands a tenant may see.
//!
//! Visibility is a pure function of registration state and the enabled
//! module set. Nothing here touches the remote registry.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::modules::ModuleId;
use crate::store::TenantStore;
use crate::tenant::{RegistrationState, TenantId};

pub const REGISTER_COMMAND: &str = "register";
pub const RESPONSE_COMMAND: &str = "response";

/// Resolve the visible command names.
///
/// A missing record resolves like `None`. Module commands come out in
/// module table order; stored keys outside the table contribute nothing.
pub fn resolve(state: Option<RegistrationState>, modules: &BTreeSet<String>) -> Vec<&'static str> {
    match state.unwrap_or_default() {
        RegistrationState::None | RegistrationState::Declined => vec![REGISTER_COMMAND],
        RegistrationState::NeedsMoreInfo => vec![RESPONSE_COMMAND],
        RegistrationState::Pending => Vec::new(),
        RegistrationState::Approved => ModuleId::ALL
            .into_iter()
            .filter(|m| modules.contains(m.as_str()))
            .flat_map(|m| m.commands().iter().copied())
            .collect(),
    }
}

/// Read a tenant from the store and resolve it.
///
/// Store failures propagate; they are never read as "no record".
pub async fn resolve_tenant(store: &dyn TenantStore, tenant: TenantId) -> Result<Vec<&'static str>> {
    let state = store.get_registration_state(tenant).await?;
    let modules = match state {
        Some(RegistrationState::Approved) => store.get_enabled_modules(tenant).await?,
        _ => BTreeSet::new(),
    };
    Ok(resolve(state, &modules))
}
