use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::observability::provisioning_metrics;
use crate::telemetry::shutdown_telemetry;

/// Ctrl-C handling and end-of-process bookkeeping for the CLI
pub struct ShutdownCoordinator;

impl ShutdownCoordinator {
    /// Cancel `token` when the user presses Ctrl-C.
    ///
    /// The session notices at its next step boundary and rolls back. Abort the
    /// returned handle once the session is closed.
    pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
        Self::cancel_on(token, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
    }

    /// Cancel `token` once `signal` resolves
    pub fn cancel_on<F>(token: CancellationToken, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                _ = signal => {
                    info!("Interrupt received, closing session at the next step boundary");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Log counters and flush telemetry before exit
    pub fn shutdown_all_services() {
        let metrics = provisioning_metrics();
        metrics.log_stats();
        let stats = metrics.get_stats();
        if stats.orphaned_artifacts > 0 {
            warn!(
                orphaned = stats.orphaned_artifacts,
                "Some test artifacts could not be removed from the provider"
            );
        }
        shutdown_telemetry();
    }
}
