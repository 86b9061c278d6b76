use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for sync activity
#[derive(Debug, Default)]
pub struct SyncMetrics {
    syncs_succeeded: AtomicU64,
    syncs_failed: AtomicU64,
    commands_installed: AtomicU64,
    privileged_syncs: AtomicU64,
    global_clears: AtomicU64,
}

/// Point-in-time copy of [`SyncMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub syncs_succeeded: u64,
    pub syncs_failed: u64,
    pub commands_installed: u64,
    pub privileged_syncs: u64,
    pub global_clears: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, installed: usize) {
        self.syncs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.commands_installed.fetch_add(installed as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.syncs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_privileged(&self) {
        self.privileged_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_global_clear(&self) {
        self.global_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn syncs_succeeded(&self) -> u64 {
        self.syncs_succeeded.load(Ordering::Relaxed)
    }

    pub fn syncs_failed(&self) -> u64 {
        self.syncs_failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            syncs_succeeded: self.syncs_succeeded.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            commands_installed: self.commands_installed.load(Ordering::Relaxed),
            privileged_syncs: self.privileged_syncs.load(Ordering::Relaxed),
            global_clears: self.global_clears.load(Ordering::Relaxed),
        }
    }
}
