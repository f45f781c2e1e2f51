//! Dedup manager: the interceptor pipeline around a transport.
//!
//! # Per-submission states
//! ```text
//! SUBMITTED → fingerprint pending? ── yes → REJECTED_DUPLICATE
//!                                  └─ no  → REGISTERED → IN_FLIGHT
//!                                             → COMPLETED | FAILED | EXPIRED
//! ```
//!
//! Pre-flight decides bypass / admit / reject synchronously. Post-flight
//! releases the registration whatever the outcome, then hands the result back
//! unchanged. Expiry happens inside the registry; a call that settles after
//! its entry expired releases nothing.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::dedup::key::{build_key, Fingerprint};
use crate::dedup::registry::{PendingRegistry, Registration};
use crate::dedup::types::{DedupError, DedupResult, DedupSettings, RegistryError};
use crate::http::request::RequestDescriptor;
use crate::http::response::TransportResponse;
use crate::http::transport::{Transport, TransportError};
use crate::observability::metrics;

/// Outcome of the pre-flight hook.
enum Preflight {
    Bypass,
    Admitted(Registration),
}

/// Releases its registration when dropped, so a cancelled `send` future
/// still frees the slot.
struct PendingGuard<'a> {
    registry: &'a PendingRegistry,
    registration: Option<Registration>,
}

impl<'a> PendingGuard<'a> {
    fn new(registry: &'a PendingRegistry, registration: Registration) -> Self {
        Self {
            registry,
            registration: Some(registration),
        }
    }

    fn release(mut self, outcome: &'static str) {
        if let Some(registration) = self.registration.take() {
            let released = self.registry.release_registration(&registration);
            tracing::debug!(
                fingerprint = %registration.fingerprint(),
                outcome,
                released,
                "Request settled"
            );
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.registry.release_registration(&registration);
            tracing::debug!(fingerprint = %registration.fingerprint(), "Request dropped before settlement");
        }
    }
}

/// Deduplicating front for a [`Transport`].
///
/// Identical mutating requests are admitted once while the first is in flight
/// (or until the dedup window elapses); the rest fail with
/// [`DedupError::Duplicate`] without touching the network.
pub struct DedupManager<T> {
    transport: T,
    registry: PendingRegistry,
    settings: DedupSettings,
}

impl<T: Transport> DedupManager<T> {
    pub fn new(transport: T, settings: DedupSettings) -> Self {
        tracing::debug!(
            window_ms = settings.window().as_millis() as u64,
            methods = ?settings.methods(),
            "Dedup manager created"
        );
        Self {
            transport,
            registry: PendingRegistry::new(settings.window()),
            settings,
        }
    }

    /// Manager with a 500 ms window that deduplicates every non-safe method.
    pub fn with_defaults(transport: T) -> Self {
        Self::new(transport, DedupSettings::default())
    }

    pub fn settings(&self) -> &DedupSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of fingerprints currently between registration and settlement.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether an identical request is in flight right now.
    pub fn is_pending(&self, descriptor: &RequestDescriptor) -> DedupResult<bool> {
        Ok(self.registry.is_pending(&build_key(descriptor)?))
    }

    /// Pending fingerprints, for diagnostics.
    pub fn pending_fingerprints(&self) -> Vec<Fingerprint> {
        self.registry.fingerprints()
    }

    /// Abort every in-flight deduplicated call and clear the registry.
    pub fn cancel_all_pending(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        tracing::info!(cancelled, "Cancelled all pending requests");
        metrics::record_cancelled(cancelled);
        cancelled
    }

    /// Send a request through the pipeline.
    pub async fn send(&self, descriptor: RequestDescriptor) -> DedupResult<TransportResponse> {
        let span = tracing::debug_span!(
            "dedup_send",
            request_id = %Uuid::new_v4(),
            method = %descriptor.method(),
            url = %descriptor.url(),
        );
        self.dispatch(descriptor).instrument(span).await
    }

    async fn dispatch(&self, descriptor: RequestDescriptor) -> DedupResult<TransportResponse> {
        let start = Instant::now();

        let registration = match self.preflight(&descriptor)? {
            Preflight::Bypass => {
                let result = self
                    .transport
                    .execute(&descriptor, CancellationToken::new())
                    .await;
                metrics::record_settled(settlement(&result), start);
                return result.map_err(DedupError::from);
            }
            Preflight::Admitted(registration) => registration,
        };

        let token = registration.token();
        let guard = PendingGuard::new(&self.registry, registration);

        let result = self.transport.execute(&descriptor, token).await;

        let outcome = settlement(&result);
        guard.release(outcome);
        metrics::record_settled(outcome, start);

        result.map_err(DedupError::from)
    }

    fn preflight(&self, descriptor: &RequestDescriptor) -> DedupResult<Preflight> {
        if descriptor.skips_dedup() || !self.settings.should_dedup(descriptor.method()) {
            metrics::record_submission("bypassed");
            return Ok(Preflight::Bypass);
        }

        let fingerprint = match build_key(descriptor) {
            Ok(fp) => fp,
            Err(e) => {
                metrics::record_submission("invalid");
                return Err(e);
            }
        };

        match self.registry.register(fingerprint) {
            Ok(registration) => {
                tracing::debug!(fingerprint = %registration.fingerprint(), "Request admitted");
                metrics::record_submission("admitted");
                Ok(Preflight::Admitted(registration))
            }
            Err(RegistryError::AlreadyPending(fingerprint)) => {
                tracing::warn!(fingerprint = %fingerprint, "Duplicate request blocked");
                metrics::record_submission("duplicate");
                Err(DedupError::Duplicate {
                    descriptor: Box::new(descriptor.clone()),
                })
            }
        }
    }
}

fn settlement(result: &Result<TransportResponse, TransportError>) -> &'static str {
    match result {
        Ok(_) => "completed",
        Err(TransportError::Cancelled) => "cancelled",
        Err(_) => "failed",
    }
}

impl<T> std::fmt::Debug for DedupManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupManager")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::SimulatedTransport;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn order() -> RequestDescriptor {
        RequestDescriptor::post("/orders").with_body(json!({"id": 1}))
    }

    fn manager(transport: SimulatedTransport) -> Arc<DedupManager<SimulatedTransport>> {
        Arc::new(DedupManager::with_defaults(transport))
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_duplicate_is_rejected() {
        let transport = SimulatedTransport::new(Duration::from_millis(200));
        let mgr = manager(transport.clone());

        let m = mgr.clone();
        let first = tokio::spawn(async move { m.send(order()).await });
        tokio::task::yield_now().await;

        let err = mgr.send(order()).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(err.descriptor(), Some(&order()));
        assert_eq!(mgr.pending_count(), 1);

        assert!(first.await.unwrap().is_ok());
        assert_eq!(transport.calls(), 1);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_releases_slot() {
        let transport = SimulatedTransport::new(Duration::from_millis(10)).with_status(500);
        let mgr = manager(transport.clone());

        let err = mgr.send(order()).await.unwrap_err();
        assert!(matches!(
            err,
            DedupError::Transport(TransportError::Status { status: 500, .. })
        ));
        assert_eq!(mgr.pending_count(), 0);

        // A genuine retry goes out.
        assert!(mgr.send(order()).await.is_err());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_dedup_bypasses_registry() {
        let transport = SimulatedTransport::new(Duration::from_millis(100));
        let mgr = manager(transport.clone());

        let (a, b) = tokio::join!(
            mgr.send(order().skip_dedup()),
            mgr.send(order().skip_dedup())
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_methods() {
        let transport = SimulatedTransport::new(Duration::from_millis(100));
        let settings = DedupSettings::default().with_methods([Method::GET]);
        let mgr = DedupManager::new(transport.clone(), settings);

        let (a, b) = tokio::join!(
            mgr.send(RequestDescriptor::get("/orders")),
            mgr.send(RequestDescriptor::get("/orders"))
        );
        assert!(a.is_ok());
        assert!(b.unwrap_err().is_duplicate());

        let (c, d) = tokio::join!(mgr.send(order()), mgr.send(order()));
        assert!(c.is_ok() && d.is_ok());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_descriptor_surfaces_immediately() {
        let transport = SimulatedTransport::new(Duration::from_millis(1));
        let mgr = manager(transport.clone());

        let err = mgr.send(RequestDescriptor::post("")).await.unwrap_err();
        assert!(matches!(err, DedupError::InvalidDescriptor(_)));
        assert_eq!(transport.calls(), 0);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_send_releases_slot() {
        let transport = SimulatedTransport::hanging();
        let mgr = manager(transport.clone());

        let m = mgr.clone();
        let call = tokio::spawn(async move { m.send(order()).await });
        tokio::task::yield_now().await;
        assert_eq!(mgr.pending_count(), 1);

        call.abort();
        let _ = call.await;
        assert_eq!(mgr.pending_count(), 0);
        assert!(!mgr.is_pending(&order()).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_surfaces_cancellation() {
        let transport = SimulatedTransport::hanging();
        let mgr = manager(transport.clone());

        let m = mgr.clone();
        let call = tokio::spawn(async move { m.send(order()).await });
        tokio::task::yield_now().await;

        assert_eq!(mgr.cancel_all_pending(), 1);
        let err = call.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert!(err.is_silent());
        assert_eq!(transport.cancellations(), 1);
    }
}
