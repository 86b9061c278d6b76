//! Core multi-tenant types for Kairo.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::KairoError;

/// A guild identifier, as issued by the chat platform.
///
/// Every tenant, including the control-plane guild, is addressed by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub u64);

impl TenantId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TenantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for TenantId {
    type Err = KairoError;

    /// Admin commands receive guild ids as free text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TenantId)
            .map_err(|_| KairoError::bad_request(format!("Invalid guild id: {s}")))
    }
}

/// Approval-workflow status of a tenant.
///
/// No state is terminal: an admin may re-decide at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    None,
    Pending,
    NeedsMoreInfo,
    Approved,
    Declined,
}

impl RegistrationState {
    pub const ALL: [RegistrationState; 5] = [
        RegistrationState::None,
        RegistrationState::Pending,
        RegistrationState::NeedsMoreInfo,
        RegistrationState::Approved,
        RegistrationState::Declined,
    ];

    /// Persisted textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::None => "none",
            RegistrationState::Pending => "pending",
            RegistrationState::NeedsMoreInfo => "needs_more_info",
            RegistrationState::Approved => "approved",
            RegistrationState::Declined => "declined",
        }
    }

    /// Whether `register` may be (re)submitted from this state.
    pub fn accepts_application(&self) -> bool {
        matches!(self, RegistrationState::None | RegistrationState::Declined)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationState {
    type Err = KairoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RegistrationState::None),
            "pending" => Ok(RegistrationState::Pending),
            "needs_more_info" => Ok(RegistrationState::NeedsMoreInfo),
            "approved" => Ok(RegistrationState::Approved),
            "declined" => Ok(RegistrationState::Declined),
            other => Err(KairoError::bad_request(format!(
                "Unknown registration state: {other}"
            ))),
        }
    }
}

/// The form a guild submits with `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationApplication {
    pub school: String,
    pub club_name: String,
    pub responsible_person: String,
    pub responsible_user_id: u64,
    pub club_type: String,
}

/// Everything the store knows about a tenant's registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registration {
    pub state: RegistrationState,
    pub reason: Option<String>,
    pub application: Option<RegistrationApplication>,
}

/// Context carried with every tenant-scoped operation.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// The user that triggered the operation, when there is one.
    pub actor: Option<u64>,
}

impl TenantContext {
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant.into(),
            actor: None,
        }
    }

    pub fn with_actor(mut self, user_id: u64) -> Self {
        self.actor = Some(user_id);
        self
    }
}
