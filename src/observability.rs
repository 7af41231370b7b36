use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Provisioning counters, process-wide
#[derive(Debug, Default)]
pub struct ProvisioningMetrics {
    pub total_requests: AtomicU64,
    pub errors: AtomicU64,
    pub sessions_committed: AtomicU64,
    pub rollbacks: AtomicU64,
    pub orphaned_artifacts: AtomicU64,
}

impl ProvisioningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.sessions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_orphaned_artifact(&self) {
        self.orphaned_artifacts.fetch_add(1, Ordering::Relaxed);
        warn!("Test artifact left behind on the provider");
    }

    pub fn get_stats(&self) -> ProvisioningStats {
        ProvisioningStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            sessions_committed: self.sessions_committed.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            orphaned_artifacts: self.orphaned_artifacts.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Provisioning metrics: requests={}, errors={}, commits={}, rollbacks={}, orphaned={}",
            stats.total_requests,
            stats.errors,
            stats.sessions_committed,
            stats.rollbacks,
            stats.orphaned_artifacts
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningStats {
    pub total_requests: u64,
    pub errors: u64,
    pub sessions_committed: u64,
    pub rollbacks: u64,
    pub orphaned_artifacts: u64,
}

/// Global metrics instance
static PROVISIONING_METRICS: std::sync::LazyLock<ProvisioningMetrics> =
    std::sync::LazyLock::new(ProvisioningMetrics::new);

pub fn provisioning_metrics() -> &'static ProvisioningMetrics {
    &PROVISIONING_METRICS
}
