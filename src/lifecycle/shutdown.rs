//! Shutdown coordination and manager teardown.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::dedup::DedupManager;
use crate::http::Transport;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancel every pending request of `manager` once shutdown fires.
///
/// Resolves to the number of calls cancelled. A dropped coordinator counts
/// as a shutdown.
pub fn spawn_teardown<T>(
    manager: Arc<DedupManager<T>>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<usize>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        tracing::info!(pending = manager.pending_count(), "Shutdown received, tearing down dedup manager");
        manager.cancel_all_pending()
    })
}
