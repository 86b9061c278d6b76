//! kairo-core: tenant model, command catalog and visibility rules for the
//! Kairo command gateway.
//!
//! Nothing in this crate talks to the remote command registry. It decides
//! *what* a tenant should see; `kairo-sync` makes the registry agree.

pub mod commands;
pub mod config;
pub mod errors;
pub mod modules;
pub mod registry;
pub mod settings;
pub mod store;
pub mod tenant;
pub mod visibility;

pub use commands::{super_admin_commands, CommandDefinition, CommandHandler, CommandScope, StaticCommand, BUILTIN_COMMANDS};
pub use config::{GatewaySettings, KairoConfig, KairoConfigSnapshot, RegistrySettings};
pub use errors::{ErrorKind, KairoError, KairoResult};
pub use modules::ModuleId;
pub use registry::CommandRegistry;
pub use settings::{
    ctfd_credentials, settings_or_default, AttendanceSettings, BookkeepingSettings, CtfdCredentials, CtfdSettings,
    MasterKey, ModuleReadiness, RestrictedReason, SecretCipher,
};
pub use store::{MemoryTenantStore, TenantStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteTenantStore;
pub use tenant::{Registration, RegistrationApplication, RegistrationState, TenantContext, TenantId};
pub use visibility::{resolve, resolve_tenant};
