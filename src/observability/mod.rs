//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dedup + http subsystems produce:
//!     → logging.rs (structured log events, one span per submission)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//!     → whatever `metrics` recorder the application installs
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
