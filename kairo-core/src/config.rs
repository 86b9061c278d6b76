//! # Configuration
//!
//! A flat string key/value store. Keys are dotted (`admin.guild_id`),
//! values are strings, and typed access goes through a snapshot.
//!
//! ```rust
//! use kairo_core::KairoConfig;
//! let mut config = KairoConfig::new();
//!
//! config.set("admin.guild_id", "42");
//! config.set("sync.max_concurrency", "4");
//!
//! assert_eq!(config.get("admin.guild_id"), Some("42"));
//! assert_eq!(config.snapshot().get_usize("sync.max_concurrency"), Some(4));
//! ```
//!
//! ## Environment
//! [`KairoConfig::load_env`] maps `KAIRO__ADMIN__GUILD_ID` to
//! `admin.guild_id`. The bot's historical flat names (`ADMIN_GUILD_ID`,
//! `DISCORD_TOKEN`, ...) are accepted as aliases and never override a
//! prefixed key.

use std::collections::HashMap;

use tracing::warn;

use crate::bail_kairo;
use crate::errors::{KairoError, KairoResult};
use crate::modules::ModuleId;
use crate::settings::MasterKey;
use crate::tenant::TenantId;

pub const DEFAULT_ENV_PREFIX: &str = "KAIRO__";
pub const DEFAULT_REGISTRY_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_SYNC_CONCURRENCY: usize = 8;

const FLAT_ALIASES: &[(&str, &str)] = &[
    ("ADMIN_GUILD_ID", "admin.guild_id"),
    ("SUPER_ADMIN_ID", "admin.super_admin_id"),
    ("DISCORD_TOKEN", "registry.token"),
    ("DISCORD_APPLICATION_ID", "registry.application_id"),
    ("MASTER_KEY_BASE64", "master_key"),
    ("DATABASE_URL", "database.url"),
];

#[derive(Debug, Default)]
pub struct KairoConfig {
    values: HashMap<String, String>,
}

impl KairoConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> KairoConfigSnapshot {
        KairoConfigSnapshot::new(self.values.clone())
    }

    /// Load overrides from the process environment.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut flat = Vec::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            } else if let Some((_, target)) = FLAT_ALIASES.iter().find(|(name, _)| *name == key) {
                flat.push((*target, value));
            }
        }
        for (target, value) in flat {
            if !self.has(target) {
                self.set(target, value);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KairoConfigSnapshot {
    map: HashMap<String, String>,
}

impl KairoConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}

/// Where the remote command registry lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub base_url: String,
    pub application_id: Option<u64>,
    pub token: Option<String>,
}

/// Typed settings for the gateway process.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// The privileged control-plane guild.
    pub admin_guild_id: TenantId,
    pub super_admin_id: Option<u64>,
    /// Modules switched on when a registration is approved.
    pub default_modules: Vec<ModuleId>,
    pub sync_max_concurrency: usize,
    pub registry: RegistrySettings,
    pub database_url: Option<String>,
    pub master_key: Option<MasterKey>,
}

impl GatewaySettings {
    pub fn from_snapshot(snapshot: &KairoConfigSnapshot) -> KairoResult<Self> {
        let admin_guild_id = match snapshot.get("admin.guild_id") {
            Some(raw) => raw.parse::<TenantId>().map_err(|e| {
                KairoError::bad_request(format!("admin.guild_id: {}", e.message)).into_anyhow()
            })?,
            None => {
                bail_kairo!(not_configured, "admin.guild_id is required");
            }
        };

        let super_admin_id = optional_u64(snapshot, "admin.super_admin_id")?;

        let default_modules = match snapshot.get("modules.default") {
            Some(raw) => parse_module_list(raw)?,
            None => ModuleId::ALL.to_vec(),
        };

        let sync_max_concurrency = match snapshot.get("sync.max_concurrency") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => {
                    bail_kairo!(bad_request, "sync.max_concurrency must be a positive integer, got {:?}", raw);
                }
                Ok(n) => n,
            },
            None => DEFAULT_SYNC_CONCURRENCY,
        };

        let registry = RegistrySettings {
            base_url: snapshot
                .get("registry.base_url")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            application_id: optional_u64(snapshot, "registry.application_id")?,
            token: non_empty(snapshot, "registry.token"),
        };

        let master_key = match non_empty(snapshot, "master_key") {
            Some(raw) => match MasterKey::from_base64(&raw) {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(error = %err, "master key rejected; encrypted module settings stay restricted");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            admin_guild_id,
            super_admin_id,
            default_modules,
            sync_max_concurrency,
            registry,
            database_url: non_empty(snapshot, "database.url"),
            master_key,
        })
    }

    pub fn is_admin_guild(&self, tenant: TenantId) -> bool {
        self.admin_guild_id == tenant
    }

    /// Only the configured super admin may run privileged commands.
    /// With none configured, nobody may.
    pub fn is_super_admin(&self, user_id: u64) -> bool {
        self.super_admin_id == Some(user_id)
    }
}

fn non_empty(snapshot: &KairoConfigSnapshot, key: &str) -> Option<String> {
    snapshot
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn optional_u64(snapshot: &KairoConfigSnapshot, key: &str) -> KairoResult<Option<u64>> {
    match non_empty(snapshot, key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| KairoError::bad_request(format!("{key} must be an integer, got {raw:?}")).into_anyhow()),
        None => Ok(None),
    }
}

fn parse_module_list(raw: &str) -> KairoResult<Vec<ModuleId>> {
    let mut modules = Vec::new();
    for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let module = key.parse::<ModuleId>().map_err(KairoError::into_anyhow)?;
        if !modules.contains(&module) {
            modules.push(module);
        }
    }
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn prefixed_env_maps_to_dotted_keys() {
        let mut config = KairoConfig::new();
        config.load_vars(
            DEFAULT_ENV_PREFIX,
            vars(&[
                ("KAIRO__ADMIN__GUILD_ID", "42"),
                ("KAIRO__SYNC__MAX_CONCURRENCY", "3"),
                ("HOME", "/root"),
            ]),
        );
        assert_eq!(config.get("admin.guild_id"), Some("42"));
        assert_eq!(config.snapshot().get_usize("sync.max_concurrency"), Some(3));
        assert!(!config.has("home"));
    }

    #[test]
    fn flat_aliases_never_override_prefixed_keys() {
        let mut config = KairoConfig::new();
        config.load_vars(
            DEFAULT_ENV_PREFIX,
            vars(&[
                ("ADMIN_GUILD_ID", "1"),
                ("KAIRO__ADMIN__GUILD_ID", "2"),
                ("DISCORD_TOKEN", "secret"),
            ]),
        );
        assert_eq!(config.get("admin.guild_id"), Some("2"));
        assert_eq!(config.get("registry.token"), Some("secret"));
    }

    #[test]
    fn settings_defaults() {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "100");
        let settings = GatewaySettings::from_snapshot(&config.snapshot()).unwrap();

        assert_eq!(settings.admin_guild_id, TenantId(100));
        assert_eq!(settings.default_modules, ModuleId::ALL.to_vec());
        assert_eq!(settings.sync_max_concurrency, DEFAULT_SYNC_CONCURRENCY);
        assert_eq!(settings.registry.base_url, DEFAULT_REGISTRY_URL);
        assert!(settings.database_url.is_none());
        assert!(settings.master_key.is_none());
        assert!(!settings.is_super_admin(0));
    }

    #[test]
    fn missing_admin_guild_is_not_configured() {
        let err = GatewaySettings::from_snapshot(&KairoConfig::new().snapshot()).unwrap_err();
        assert_eq!(KairoError::normalize(err).kind, ErrorKind::NotConfigured);
    }

    #[test]
    fn default_modules_parse_and_reject_unknown_keys() {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "1");
        config.set("modules.default", " qa, crypto ,qa,");
        let settings = GatewaySettings::from_snapshot(&config.snapshot()).unwrap();
        assert_eq!(settings.default_modules, vec![ModuleId::Qa, ModuleId::Crypto]);

        config.set("modules.default", "qa,teleport");
        let err = GatewaySettings::from_snapshot(&config.snapshot()).unwrap_err();
        assert_eq!(KairoError::normalize(err).kind, ErrorKind::BadRequest);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "1");
        config.set("sync.max_concurrency", "0");
        assert!(GatewaySettings::from_snapshot(&config.snapshot()).is_err());
    }

    #[test]
    fn super_admin_gate() {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "1");
        config.set("admin.super_admin_id", "777");
        let settings = GatewaySettings::from_snapshot(&config.snapshot()).unwrap();
        assert!(settings.is_super_admin(777));
        assert!(!settings.is_super_admin(778));
        assert!(settings.is_admin_guild(TenantId(1)));
    }

    #[test]
    fn bad_master_key_is_dropped_not_fatal() {
        let mut config = KairoConfig::new();
        config.set("admin.guild_id", "1");
        config.set("master_key", "dG9vIHNob3J0");
        let settings = GatewaySettings::from_snapshot(&config.snapshot()).unwrap();
        assert!(settings.master_key.is_none());
    }
}
