//! Request deduplication subsystem.
//!
//! # Data Flow
//! ```text
//! send(descriptor)
//!     → manager.rs pre-flight: bypass safe methods / opt-outs
//!     → key.rs: descriptor → Fingerprint
//!     → registry.rs: atomic register (or reject as duplicate)
//!     → transport executes with the entry's cancellation token (cancel.rs)
//!     → manager.rs post-flight: release registration, return result as-is
//!
//! In the background:
//!     registry.rs expiry timer frees slots whose call never settles
//!     cancel_all_pending() fires every live token and clears the registry
//! ```
//!
//! # Design Decisions
//! - One registry per manager instance; no process-wide state
//! - Duplicates and bad descriptors are the only errors the manager manufactures
//! - Expiry releases the slot but never aborts the network call

pub mod cancel;
pub mod key;
pub mod manager;
pub mod registry;
pub mod types;

pub use cancel::CancellationHandle;
pub use key::{build_key, Fingerprint};
pub use manager::DedupManager;
pub use registry::{PendingRegistry, Registration};
pub use types::{DedupError, DedupResult, DedupSettings, RegistryError, DEFAULT_WINDOW};
