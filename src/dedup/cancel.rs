//! Single-use cancellation handles.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Capability to abort one in-flight transport call.
///
/// The first call to [`cancel`](Self::cancel) or [`invalidate`](Self::invalidate)
/// spends the handle; later calls are no-ops.
#[derive(Debug)]
pub struct CancellationHandle {
    token: CancellationToken,
    live: AtomicBool,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            live: AtomicBool::new(true),
        }
    }

    /// Token handed to the transport.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the token. Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        if self.live.swap(false, Ordering::AcqRel) {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    /// Spend the handle without touching the token.
    pub fn invalidate(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}
