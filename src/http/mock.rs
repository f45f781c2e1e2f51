//! Simulated transport for dry runs and tests.
//!
//! Answers every request with a fixed status after a fixed latency, or never
//! answers at all when built with [`SimulatedTransport::hanging`]. Counts
//! calls, completions and cancellations so callers can observe what reached
//! the "network".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::http::request::RequestDescriptor;
use crate::http::response::TransportResponse;
use crate::http::transport::{Transport, TransportError};

#[derive(Debug, Default)]
struct SimulatedStats {
    calls: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
    requests: Mutex<Vec<RequestDescriptor>>,
}

/// In-process transport with configurable latency.
///
/// Clones share their counters.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    latency: Option<Duration>,
    status: u16,
    body: String,
    stats: Arc<SimulatedStats>,
}

impl SimulatedTransport {
    /// Respond with `200 {}` after `latency`.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            status: 200,
            body: "{}".to_string(),
            stats: Arc::new(SimulatedStats::default()),
        }
    }

    /// Never respond; only cancellation ends a call.
    pub fn hanging() -> Self {
        Self {
            latency: None,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Number of requests that reached this transport.
    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to completion (success or status error).
    pub fn completions(&self) -> usize {
        self.stats.completed.load(Ordering::SeqCst)
    }

    /// Number of calls aborted through their token.
    pub fn cancellations(&self) -> usize {
        self.stats.cancelled.load(Ordering::SeqCst)
    }

    /// Every descriptor received, in arrival order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.stats
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Transport for SimulatedTransport {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        self.stats
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let latency = self.latency;
        let wait = async move {
            match latency {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.stats.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Cancelled)
            }
            _ = wait => {
                self.stats.completed.fetch_add(1, Ordering::SeqCst);
                if (200..300).contains(&self.status) {
                    Ok(TransportResponse::new(self.status, self.body.clone()))
                } else {
                    Err(TransportError::Status {
                        status: self.status,
                        body: self.body.clone(),
                    })
                }
            }
        }
    }
}
