use std::sync::Arc;

use dashmap::DashMap;
use kairo_core::TenantId;
use tokio::sync::Mutex;

/// Per-guild async locks, created on first use.
///
/// A lock covers one guild's tree for the whole read-clear-install
/// sequence. Different guilds never contend.
#[derive(Clone, Default)]
pub struct ScopeLocks {
    locks: Arc<DashMap<TenantId, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, scope: TenantId) -> Arc<Mutex<()>> {
        self.locks.entry(scope).or_default().clone()
    }

    /// Drop the entry for a guild unless a sync still holds it.
    pub fn forget(&self, scope: TenantId) -> bool {
        self.locks
            .remove_if(&scope, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_scope_shares_a_lock() {
        let locks = ScopeLocks::new();
        let a = locks.lock_for(TenantId(1));
        let b = locks.lock_for(TenantId(1));
        assert!(Arc::ptr_eq(&a, &b));

        let _held = a.lock().await;
        assert!(b.try_lock().is_err());
        assert!(locks.lock_for(TenantId(2)).try_lock().is_ok());
    }

    #[tokio::test]
    async fn forget_keeps_locks_in_use() {
        let locks = ScopeLocks::new();
        let held = locks.lock_for(TenantId(7));
        assert!(!locks.forget(TenantId(7)));
        drop(held);
        assert!(locks.forget(TenantId(7)));
        assert!(locks.is_empty());
    }
}
