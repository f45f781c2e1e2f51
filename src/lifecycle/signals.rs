//! OS signal handling.
//!
//! Ctrl+C is translated into a [`Shutdown::trigger`], which in turn cancels
//! every pending request through the teardown task.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Wait for Ctrl+C.
///
/// Returns `false` when the handler could not be installed; callers then
/// simply never see a signal.
pub async fn shutdown_signal() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            false
        }
    }
}

/// Trigger `shutdown` on the first Ctrl+C.
pub fn forward_signals(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if shutdown_signal().await {
            shutdown.trigger();
        }
    })
}
