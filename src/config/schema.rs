//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for a dedup client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Deduplication window and method set.
    pub dedup: DedupConfig,

    /// Underlying HTTP transport settings.
    pub transport: TransportConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Deduplication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How long a fingerprint stays pending if its call never settles.
    pub window_ms: u64,

    /// HTTP methods to deduplicate. Omit to cover every non-safe method.
    pub methods: Option<Vec<String>>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_ms: 500,
            methods: None,
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL relative request URLs are joined onto.
    pub base_url: Option<String>,

    /// Per-request timeout in seconds. Independent of the dedup window.
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            user_agent: concat!("request-dedup/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
