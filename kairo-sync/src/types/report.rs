use std::collections::BTreeSet;

use kairo_core::{RegistrationApplication, RegistrationState, TenantId};
use serde::Serialize;

use crate::error::SyncError;

/// Outcome of a reconcile pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Privileged sync result; `None` when the pass did not include it.
    pub privileged: Option<Result<usize, SyncError>>,
    /// Tenants whose tree now matches their state, ascending.
    pub succeeded: Vec<TenantId>,
    /// Tenants left as they were, ascending.
    pub failed: Vec<(TenantId, SyncError)>,
    /// Ids passed in but not synced as tenants (the privileged guild).
    pub skipped: Vec<TenantId>,
}

impl ReconcileReport {
    pub fn privileged_ok(&self) -> bool {
        !matches!(self.privileged, Some(Err(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.privileged_ok() && self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<TenantId> {
        self.failed.iter().map(|(id, _)| *id).collect()
    }
}

/// What an admin sees for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantInspection {
    pub tenant: TenantId,
    /// False when the store has no record; `state` then reads `None`.
    pub recorded: bool,
    pub state: RegistrationState,
    pub reason: Option<String>,
    pub application: Option<RegistrationApplication>,
    pub enabled_modules: BTreeSet<String>,
    pub visible_commands: Vec<&'static str>,
}
