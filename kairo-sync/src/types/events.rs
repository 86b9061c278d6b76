use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScopeKey;

/// Structured sync events, broadcast to any subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// The scope lock was taken and the sync began.
    Started { scope: ScopeKey, at: DateTime<Utc> },

    Completed {
        scope: ScopeKey,
        installed: usize,
        at: DateTime<Utc>,
    },

    Failed {
        scope: ScopeKey,
        cause: String,
        at: DateTime<Utc>,
    },

    /// The unscoped tree was wiped during a privileged sync.
    GlobalCleared { at: DateTime<Utc> },
}

impl SyncEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::GlobalCleared { .. } => "global_cleared",
        }
    }

    pub fn scope(&self) -> ScopeKey {
        match self {
            Self::Started { scope, .. } | Self::Completed { scope, .. } | Self::Failed { scope, .. } => *scope,
            Self::GlobalCleared { .. } => ScopeKey::Global,
        }
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Started { at, .. } => at,
            Self::Completed { at, .. } => at,
            Self::Failed { at, .. } => at,
            Self::GlobalCleared { at } => at,
        }
    }
}
