//! Request deduplication and cancellation for HTTP clients.
//!
//! ```text
//!   caller ──send(descriptor)──▶ ┌──────────────────────────────┐
//!                                │ dedup::DedupManager          │
//!                                │  pre-flight: key + registry  │──Duplicate──▶ caller
//!                                └──────────────┬───────────────┘
//!                                               ▼
//!                                ┌──────────────────────────────┐
//!                                │ http::Transport              │──▶ network
//!                                │  (reqwest / simulated)       │
//!                                └──────────────┬───────────────┘
//!                                               ▼
//!                                  post-flight: release entry ──▶ caller
//! ```

pub mod config;
pub mod dedup;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ClientConfig;
pub use dedup::{DedupError, DedupManager, DedupSettings, Fingerprint};
pub use http::{RequestDescriptor, ReqwestTransport, SimulatedTransport, Transport, TransportError, TransportResponse};
pub use lifecycle::Shutdown;
