use std::fmt;

use kairo_core::TenantId;
use serde::{Deserialize, Serialize};

/// A command-tree partition in the remote registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKey {
    /// One guild's tree. The privileged guild is also addressed this way.
    Guild(TenantId),
    /// The unscoped tree every guild sees.
    Global,
}

impl ScopeKey {
    pub fn guild(&self) -> Option<TenantId> {
        match self {
            ScopeKey::Guild(id) => Some(*id),
            ScopeKey::Global => None,
        }
    }
}

impl From<TenantId> for ScopeKey {
    fn from(id: TenantId) -> Self {
        ScopeKey::Guild(id)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Guild(id) => write!(f, "guild:{id}"),
            ScopeKey::Global => f.write_str("global"),
        }
    }
}
