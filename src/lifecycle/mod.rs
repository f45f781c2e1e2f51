//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (signals.rs → shutdown.rs):
//!     Ctrl+C / session ends → Shutdown::trigger()
//!     → spawn_teardown task → DedupManager::cancel_all_pending()
//!     → every in-flight deduplicated call sees its token cancelled
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{spawn_teardown, Shutdown};
pub use signals::{forward_signals, shutdown_signal};
