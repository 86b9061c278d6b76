//! SQLite adapter for tenant state.
//!
//! Guild ids are stored as their bit pattern in an `INTEGER` column and
//! converted back on read.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

use crate::errors::KairoError;
use crate::modules::ModuleId;
use crate::store::TenantStore;
use crate::tenant::{Registration, RegistrationApplication, RegistrationState, TenantId};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS registration_status (
        guild_id INTEGER PRIMARY KEY,
        status TEXT NOT NULL DEFAULT 'none',
        reason TEXT,
        school TEXT,
        club_name TEXT,
        responsible_person TEXT,
        responsible_discord_id INTEGER,
        club_type TEXT,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS org_modules (
        guild_id INTEGER NOT NULL,
        module TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (guild_id, module)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS module_settings (
        guild_id INTEGER NOT NULL,
        module TEXT NOT NULL,
        settings_json TEXT NOT NULL,
        PRIMARY KEY (guild_id, module)
    )
    "#,
];

fn db_id(tenant: TenantId) -> i64 {
    tenant.get() as i64
}

fn tenant_from_db(raw: i64) -> TenantId {
    TenantId(raw as u64)
}

fn parse_state(raw: &str) -> Result<RegistrationState> {
    raw.parse::<RegistrationState>()
        .map_err(|e| KairoError::unprocessable(format!("stored registration status: {}", e.message)).into_anyhow())
}

#[derive(Clone)]
pub struct SqliteTenantStore {
    pool: SqlitePool,
}

impl SqliteTenantStore {
    /// Connect and create the schema if needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_options(database_url, 5).await
    }

    /// `sqlite::memory:` databases are per connection, so pass one
    /// connection for those.
    pub async fn connect_with_options(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open tenant database at {database_url}"))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context("failed to create tenant schema")?;
        }
        debug!("tenant schema ready");
        Ok(())
    }
}

#[async_trait]
impl TenantStore for SqliteTenantStore {
    async fn get_registration_state(&self, tenant: TenantId) -> Result<Option<RegistrationState>> {
        let row = sqlx::query("SELECT status FROM registration_status WHERE guild_id = ?")
            .bind(db_id(tenant))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(parse_state(row.try_get::<&str, _>("status")?)?)),
            None => Ok(None),
        }
    }

    async fn set_registration_state(
        &self,
        tenant: TenantId,
        state: RegistrationState,
        reason: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO registration_status (guild_id, status, reason, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(guild_id) DO UPDATE SET
                status = excluded.status,
                reason = excluded.reason,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(db_id(tenant))
        .bind(state.as_str())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_enabled_modules(&self, tenant: TenantId) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT module FROM org_modules WHERE guild_id = ? AND enabled = 1")
            .bind(db_id(tenant))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("module").map_err(Into::into))
            .collect()
    }

    async fn set_module_enabled(&self, tenant: TenantId, module: ModuleId, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO org_modules (guild_id, module, enabled)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, module) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(db_id(tenant))
        .bind(module.as_str())
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_tenant(&self, tenant: TenantId) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO registration_status (guild_id, status) VALUES (?, 'none')")
            .bind(db_id(tenant))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_registration(&self, tenant: TenantId) -> Result<Option<Registration>> {
        let row = sqlx::query(
            r#"
            SELECT status, reason, school, club_name, responsible_person,
                   responsible_discord_id, club_type
            FROM registration_status WHERE guild_id = ?
            "#,
        )
        .bind(db_id(tenant))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state = parse_state(row.try_get::<&str, _>("status")?)?;
        let application = match (
            row.try_get::<Option<String>, _>("school")?,
            row.try_get::<Option<String>, _>("club_name")?,
            row.try_get::<Option<String>, _>("responsible_person")?,
            row.try_get::<Option<i64>, _>("responsible_discord_id")?,
            row.try_get::<Option<String>, _>("club_type")?,
        ) {
            (Some(school), Some(club_name), Some(responsible_person), Some(user), Some(club_type)) => {
                Some(RegistrationApplication {
                    school,
                    club_name,
                    responsible_person,
                    responsible_user_id: user as u64,
                    club_type,
                })
            }
            _ => None,
        };

        Ok(Some(Registration {
            state,
            reason: row.try_get("reason")?,
            application,
        }))
    }

    async fn save_application(&self, tenant: TenantId, application: RegistrationApplication) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO registration_status
                (guild_id, school, club_name, responsible_person, responsible_discord_id, club_type, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(guild_id) DO UPDATE SET
                school = excluded.school,
                club_name = excluded.club_name,
                responsible_person = excluded.responsible_person,
                responsible_discord_id = excluded.responsible_discord_id,
                club_type = excluded.club_type,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(db_id(tenant))
        .bind(application.school)
        .bind(application.club_name)
        .bind(application.responsible_person)
        .bind(application.responsible_user_id as i64)
        .bind(application.club_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantId>> {
        let rows = sqlx::query(
            r#"
            SELECT guild_id FROM registration_status
            UNION SELECT guild_id FROM org_modules
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("guild_id").map(tenant_from_db))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort();
        Ok(ids)
    }

    async fn get_module_settings(&self, tenant: TenantId, module: ModuleId) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT settings_json FROM module_settings WHERE guild_id = ? AND module = ?")
            .bind(db_id(tenant))
            .bind(module.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("settings_json")?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(%tenant, module = module.as_str(), error = %err, "stored module settings are not JSON");
                Ok(None)
            }
        }
    }

    async fn set_module_settings(&self, tenant: TenantId, module: ModuleId, settings: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO module_settings (guild_id, module, settings_json)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, module) DO UPDATE SET settings_json = excluded.settings_json
            "#,
        )
        .bind(db_id(tenant))
        .bind(module.as_str())
        .bind(serde_json::to_string(&settings)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
