use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kairo_core::{CommandDefinition, TenantId};
use parking_lot::RwLock;

use crate::backend::RemoteRegistry;
use crate::types::ScopeKey;
use crate::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOp {
    List,
    Clear,
    Install,
    Replace,
}

/// One recorded registry call.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub scope: ScopeKey,
    pub op: RegistryOp,
    /// Definitions sent, for installs.
    pub count: usize,
    pub ok: bool,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct Faults {
    scopes: HashSet<ScopeKey>,
    next: Vec<(ScopeKey, RegistryOp)>,
}

/// In-memory registry for tests and local runs.
///
/// Every call is journaled. Faults can be set per scope (every call
/// fails until healed) or per call (the next matching call fails once).
/// Replaces are a single atomic call unless [`with_split_replace`]
/// is set.
///
/// [`with_split_replace`]: MemoryRegistry::with_split_replace
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    trees: Arc<RwLock<BTreeMap<ScopeKey, Vec<String>>>>,
    journal: Arc<RwLock<Vec<JournalEntry>>>,
    faults: Arc<RwLock<Faults>>,
    latency: Option<Duration>,
    split_replace: bool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every call, between recording it and applying it.
    /// Makes unsynchronized callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Behave like a registry without a bulk overwrite: a replace is a
    /// clear call followed by an install call.
    pub fn with_split_replace(mut self) -> Self {
        self.split_replace = true;
        self
    }

    /// Put commands in a tree directly, bypassing the journal.
    pub fn seed<I, S>(&self, scope: ScopeKey, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trees
            .write()
            .insert(scope, names.into_iter().map(Into::into).collect());
    }

    pub fn commands(&self, scope: ScopeKey) -> Vec<String> {
        self.trees.read().get(&scope).cloned().unwrap_or_default()
    }

    pub fn fail_scope(&self, scope: ScopeKey) {
        self.faults.write().scopes.insert(scope);
    }

    pub fn heal_scope(&self, scope: ScopeKey) {
        self.faults.write().scopes.remove(&scope);
    }

    /// Fail the next `op` against `scope`, once.
    pub fn fail_next(&self, scope: ScopeKey, op: RegistryOp) {
        self.faults.write().next.push((scope, op));
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.read().clone()
    }

    pub fn journal_for(&self, scope: ScopeKey) -> Vec<JournalEntry> {
        self.journal
            .read()
            .iter()
            .filter(|e| e.scope == scope)
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal.write().clear();
    }

    fn should_fail(&self, scope: ScopeKey, op: RegistryOp) -> bool {
        let mut faults = self.faults.write();
        if faults.scopes.contains(&scope) {
            return true;
        }
        if let Some(pos) = faults.next.iter().position(|f| *f == (scope, op)) {
            faults.next.remove(pos);
            return true;
        }
        false
    }

    async fn enter(&self, scope: ScopeKey, op: RegistryOp, count: usize) -> SyncResult<()> {
        let ok = !self.should_fail(scope, op);
        self.journal.write().push(JournalEntry {
            scope,
            op,
            count,
            ok,
            at: Utc::now(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if ok {
            Ok(())
        } else {
            Err(SyncError::remote(scope, format!("injected {op:?} failure")))
        }
    }

    async fn list(&self, scope: ScopeKey) -> SyncResult<Vec<String>> {
        self.enter(scope, RegistryOp::List, 0).await?;
        Ok(self.commands(scope))
    }

    async fn clear(&self, scope: ScopeKey) -> SyncResult<()> {
        self.enter(scope, RegistryOp::Clear, 0).await?;
        self.trees.write().remove(&scope);
        Ok(())
    }
}

#[async_trait]
impl RemoteRegistry for MemoryRegistry {
    async fn list_scoped_commands(&self, scope: TenantId) -> SyncResult<Vec<String>> {
        self.list(ScopeKey::Guild(scope)).await
    }

    async fn clear_scoped_commands(&self, scope: TenantId) -> SyncResult<()> {
        self.clear(ScopeKey::Guild(scope)).await
    }

    async fn install_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize> {
        let key = ScopeKey::Guild(scope);
        self.enter(key, RegistryOp::Install, defs.len()).await?;

        let mut trees = self.trees.write();
        let tree = trees.entry(key).or_default();
        for def in defs {
            if !tree.iter().any(|name| name == def.name) {
                tree.push(def.name.to_string());
            }
        }
        Ok(defs.len())
    }

    async fn replace_scoped_commands(&self, scope: TenantId, defs: &[CommandDefinition]) -> SyncResult<usize> {
        if self.split_replace {
            self.clear_scoped_commands(scope).await?;
            return self.install_scoped_commands(scope, defs).await;
        }

        let key = ScopeKey::Guild(scope);
        self.enter(key, RegistryOp::Replace, defs.len()).await?;
        self.trees
            .write()
            .insert(key, defs.iter().map(|def| def.name.to_string()).collect());
        Ok(defs.len())
    }

    async fn clear_global_commands(&self) -> SyncResult<()> {
        self.clear(ScopeKey::Global).await
    }

    async fn list_global_commands(&self) -> SyncResult<Vec<String>> {
        self.list(ScopeKey::Global).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairo_core::BUILTIN_COMMANDS;

    #[tokio::test]
    async fn install_adds_and_clear_empties() {
        let registry = MemoryRegistry::new();
        let t = TenantId(1);
        registry.install_scoped_commands(t, &BUILTIN_COMMANDS[..2]).await.unwrap();
        registry.install_scoped_commands(t, &BUILTIN_COMMANDS[1..3]).await.unwrap();
        assert_eq!(registry.list_scoped_commands(t).await.unwrap().len(), 3);

        registry.clear_scoped_commands(t).await.unwrap();
        assert!(registry.list_scoped_commands(t).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_tree() {
        let registry = MemoryRegistry::new();
        let t = TenantId(5);
        registry.replace_scoped_commands(t, &BUILTIN_COMMANDS[..2]).await.unwrap();
        let before = registry.commands(ScopeKey::Guild(t));

        registry.fail_next(ScopeKey::Guild(t), RegistryOp::Replace);
        assert!(registry.replace_scoped_commands(t, &BUILTIN_COMMANDS[2..5]).await.is_err());

        assert_eq!(registry.commands(ScopeKey::Guild(t)), before);
        let ops: Vec<_> = registry.journal().into_iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![RegistryOp::Replace, RegistryOp::Replace]);
    }

    #[tokio::test]
    async fn replace_overwrites_rather_than_merges() {
        let registry = MemoryRegistry::new();
        let t = TenantId(6);
        registry.seed(ScopeKey::Guild(t), ["stale"]);

        let installed = registry.replace_scoped_commands(t, &BUILTIN_COMMANDS[..1]).await.unwrap();

        assert_eq!(installed, 1);
        assert_eq!(registry.commands(ScopeKey::Guild(t)), vec![BUILTIN_COMMANDS[0].name]);
    }

    #[tokio::test]
    async fn split_replace_empties_tree_when_install_fails() {
        let registry = MemoryRegistry::new().with_split_replace();
        let t = TenantId(7);
        registry.seed(ScopeKey::Guild(t), ["stale"]);
        registry.fail_next(ScopeKey::Guild(t), RegistryOp::Install);

        assert!(registry.replace_scoped_commands(t, &BUILTIN_COMMANDS[..1]).await.is_err());

        assert!(registry.commands(ScopeKey::Guild(t)).is_empty());
        let ops: Vec<_> = registry.journal().into_iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![RegistryOp::Clear, RegistryOp::Install]);
    }

    #[tokio::test]
    async fn scope_faults_persist_until_healed() {
        let registry = MemoryRegistry::new();
        let scope = ScopeKey::Guild(TenantId(2));
        registry.fail_scope(scope);

        let err = registry.clear_scoped_commands(TenantId(2)).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable { scope: s, .. } if s == scope));
        assert!(registry.clear_scoped_commands(TenantId(2)).await.is_err());
        assert!(registry.clear_scoped_commands(TenantId(3)).await.is_ok());

        registry.heal_scope(scope);
        assert!(registry.clear_scoped_commands(TenantId(2)).await.is_ok());
    }

    #[tokio::test]
    async fn call_faults_fire_once() {
        let registry = MemoryRegistry::new();
        registry.fail_next(ScopeKey::Global, RegistryOp::Clear);
        assert!(registry.clear_global_commands().await.is_err());
        assert!(registry.clear_global_commands().await.is_ok());

        let journal = registry.journal_for(ScopeKey::Global);
        assert_eq!(journal.len(), 2);
        assert!(!journal[0].ok);
        assert!(journal[1].ok);
    }
}
