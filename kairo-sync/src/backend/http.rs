//! REST command registry.
//!
//! Guild trees live at `/applications/{app}/guilds/{guild}/commands`,
//! the unscoped tree at `/applications/{app}/commands`. A bulk `PUT`
//! overwrites a tree, so clearing is `PUT []` and a replace is a single
//! `PUT` of the new set.

use std::time::Duration;

use async_trait::async_trait;
use kairo_core::{CommandDefinition, RegistrySettings, TenantId};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::backend::RemoteRegistry;
use crate::types::ScopeKey;
use crate::{SyncError, SyncResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RemoteCommand {
    name: String,
}

pub struct HttpRegistry {
    client: Client,
    base_url: String,
    application_id: u64,
    token: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, application_id: u64, token: impl Into<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            application_id,
            token: token.into(),
        })
    }

    pub fn from_settings(settings: &RegistrySettings) -> SyncResult<Self> {
        let application_id = settings
            .application_id
            .ok_or_else(|| SyncError::Internal("registry.application_id is not configured".to_string()))?;
        let token = settings
            .token
            .clone()
            .ok_or_else(|| SyncError::Internal("registry.token is not configured".to_string()))?;
        Self::new(settings.base_url.clone(), application_id, token)
    }

    pub(crate) fn url(&self, scope: ScopeKey) -> String {
        match scope {
            ScopeKey::Guild(guild) => format!(
                "{}/applications/{}/guilds/{}/commands",
                self.base_url, self.application_id, guild
            ),
            ScopeKey::Global => format!("{}/applications/{}/commands", self.base_url, self.application_id),
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn get(&self, scope: ScopeKey) -> SyncResult<Vec<String>> {
        let commands = self
            .authed(self.client.get(self.url(scope)))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::remote(scope, e.to_string()))?
            .json::<Vec<RemoteCommand>>()
            .await
            .map_err(|e| SyncError::remote(scope, format!("unreadable command list: {e}")))?;
        Ok(commands.into_iter().map(|c| c.name).collect())
    }

    async fn put(&self, scope: ScopeKey, defs: &[CommandDefinition]) -> SyncResult<usize> {
        debug!(%scope, count = defs.len(), "overwriting command tree");
        let installed = self
            .authed(self.client.put(self.url(scope)))
            .json(defs)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::remote(scope, e.to_string()))?
            .json::<Vec<RemoteCommand>>()
            .await
            .map_err(|e| SyncError::remote(scope, format!("unreadable install response: {e}")))?;
        Ok(installed.len())
    }
}

#[async_trait]
impl RemoteRegistry for HttpRegistry {
    async fn list_scoped_commands(&self, scope: TenantId) -> SyncResult<Vec<String>> {
        self.get(ScopeKey::Guild(scope)).await
    }

    async fn clear_scoped_commands(&self, scope: TenantId) -> SyncResult<()> {
        self.put(ScopeKey::Guild(scope), &[]).await.map(|_| ())
    }

    async fn install_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize> {
        self.put(ScopeKey::Guild(scope), defs).await
    }

    async fn replace_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize> {
        self.put(ScopeKey::Guild(scope), defs).await
    }

    async fn clear_global_commands(&self) -> SyncResult<()> {
        self.put(ScopeKey::Global, &[]).await.map(|_| ())
    }

    async fn list_global_commands(&self) -> SyncResult<Vec<String>> {
        self.get(ScopeKey::Global).await
    }
}
