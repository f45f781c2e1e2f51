//! Pending request registry.
//!
//! # Responsibilities
//! - Track which fingerprints are currently in flight
//! - Admit at most one entry per fingerprint
//! - Expire entries whose call never settles
//! - Cancel every live call on teardown
//!
//! # Design Decisions
//! - `DashMap::entry` makes check-then-insert one step; no `.await` inside
//! - Each entry gets an id so expiry and late settlement only ever remove
//!   the entry they were created for
//! - Expiry frees the slot and spends the handle but leaves the call running

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dedup::cancel::CancellationHandle;
use crate::dedup::key::Fingerprint;
use crate::dedup::types::RegistryError;
use crate::observability::metrics;

struct PendingEntry {
    id: u64,
    handle: CancellationHandle,
    expiry: JoinHandle<()>,
}

impl PendingEntry {
    /// Stop the expiry timer and spend the handle.
    fn retire(self) {
        self.expiry.abort();
        self.handle.invalidate();
    }
}

/// Proof of admission returned by [`PendingRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    fingerprint: Fingerprint,
    id: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token to attach to the outgoing call.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Fingerprint → in-flight entry map owned by one manager.
#[derive(Clone)]
pub struct PendingRegistry {
    entries: Arc<DashMap<Fingerprint, PendingEntry>>,
    next_id: Arc<AtomicU64>,
    window: Duration,
}

impl PendingRegistry {
    /// Create an empty registry whose entries expire after `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_pending(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Admit `fingerprint` unless it is already pending.
    ///
    /// Starts the expiry timer, so this must run inside a Tokio runtime.
    pub fn register(&self, fingerprint: Fingerprint) -> Result<Registration, RegistryError> {
        let registration = match self.entries.entry(fingerprint.clone()) {
            Entry::Occupied(_) => return Err(RegistryError::AlreadyPending(fingerprint)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let handle = CancellationHandle::new();
                let token = handle.token();
                let expiry = self.spawn_expiry(fingerprint.clone(), id);
                slot.insert(PendingEntry { id, handle, expiry });
                Registration {
                    fingerprint,
                    id,
                    token,
                }
            }
        };

        // Shard lock released above; len() takes every shard.
        metrics::record_pending(self.entries.len());
        Ok(registration)
    }

    /// Remove whatever entry holds `fingerprint`. No-op when absent.
    pub fn release(&self, fingerprint: &Fingerprint) -> bool {
        match self.entries.remove(fingerprint) {
            Some((_, entry)) => {
                entry.retire();
                metrics::record_pending(self.entries.len());
                true
            }
            None => false,
        }
    }

    /// Remove the entry only if it is still the one `registration` created.
    pub fn release_registration(&self, registration: &Registration) -> bool {
        match self
            .entries
            .remove_if(&registration.fingerprint, |_, entry| entry.id == registration.id)
        {
            Some((_, entry)) => {
                entry.retire();
                metrics::record_pending(self.entries.len());
                true
            }
            None => false,
        }
    }

    /// Cancel every live entry and clear the registry.
    ///
    /// Returns the number of handles that were actually cancelled.
    pub fn cancel_all(&self) -> usize {
        let fingerprints: Vec<Fingerprint> = self.entries.iter().map(|r| r.key().clone()).collect();

        let mut cancelled = 0;
        for fingerprint in fingerprints {
            if let Some((_, entry)) = self.entries.remove(&fingerprint) {
                entry.expiry.abort();
                if entry.handle.cancel() {
                    cancelled += 1;
                }
            }
        }

        metrics::record_pending(self.entries.len());
        cancelled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of pending fingerprints, for diagnostics.
    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    fn spawn_expiry(&self, fingerprint: Fingerprint, id: u64) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some((fingerprint, entry)) = entries.remove_if(&fingerprint, |_, e| e.id == id) {
                entry.handle.invalidate();
                tracing::warn!(
                    fingerprint = %fingerprint,
                    window_ms = window.as_millis() as u64,
                    "Pending entry expired before settlement"
                );
                metrics::record_expired();
                metrics::record_pending(entries.len());
            }
        })
    }
}

impl std::fmt::Debug for PendingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRegistry")
            .field("pending", &self.entries.len())
            .field("window", &self.window)
            .finish()
    }
}
