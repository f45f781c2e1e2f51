//! Settings and error definitions for the dedup subsystem.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Method;
use thiserror::Error;

use crate::config::validation::{parse_method, ValidationError};
use crate::config::DedupConfig;
use crate::dedup::key::Fingerprint;
use crate::http::request::RequestDescriptor;
use crate::http::transport::TransportError;

/// Default dedup window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Runtime settings for a [`DedupManager`](crate::dedup::DedupManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupSettings {
    window: Duration,
    methods: Option<HashSet<Method>>,
}

impl DedupSettings {
    /// Parse settings out of the `[dedup]` config section.
    pub fn from_config(config: &DedupConfig) -> Result<Self, ValidationError> {
        let settings = Self::default().with_window(Duration::from_millis(config.window_ms))?;
        let methods = match &config.methods {
            Some(names) => Some(
                names
                    .iter()
                    .map(|name| parse_method(name))
                    .collect::<Result<HashSet<_>, _>>()?,
            ),
            None => None,
        };

        Ok(Self { methods, ..settings })
    }

    /// Set the dedup window. A zero window would expire every entry on the
    /// next scheduler turn, so it is rejected.
    pub fn with_window(mut self, window: Duration) -> Result<Self, ValidationError> {
        if window.is_zero() {
            return Err(ValidationError::ZeroWindow);
        }
        self.window = window;
        Ok(self)
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// How long a fingerprint stays pending if the transport never settles.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Methods to deduplicate. `None` means every non-safe method.
    pub fn methods(&self) -> Option<&HashSet<Method>> {
        self.methods.as_ref()
    }

    /// Whether requests with this method go through deduplication.
    pub fn should_dedup(&self, method: &Method) -> bool {
        match &self.methods {
            Some(methods) => methods.contains(method),
            None => !method.is_safe(),
        }
    }
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            methods: None,
        }
    }
}

/// Errors surfaced to callers of [`DedupManager::send`](crate::dedup::DedupManager::send).
#[derive(Debug, Error)]
pub enum DedupError {
    /// The descriptor cannot be fingerprinted or serialized.
    #[error("invalid request descriptor: {0}")]
    InvalidDescriptor(String),

    /// An identical request is still in flight. The transport was not called.
    #[error("request already in progress: {} {}", .descriptor.method(), .descriptor.url())]
    Duplicate { descriptor: Box<RequestDescriptor> },

    /// Passthrough of the transport's own failure.
    #[error(transparent)]
    Transport(TransportError),

    /// The call was aborted by `cancel_all_pending`.
    #[error("request cancelled")]
    Cancelled,
}

impl DedupError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupError::Duplicate { .. })
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, DedupError::Cancelled)
    }

    /// Conditions a UI should swallow instead of reporting as failures.
    pub fn is_silent(&self) -> bool {
        self.is_duplicate() || self.is_cancellation()
    }

    /// The rejected descriptor, for duplicates.
    pub fn descriptor(&self) -> Option<&RequestDescriptor> {
        match self {
            DedupError::Duplicate { descriptor } => Some(descriptor),
            _ => None,
        }
    }
}

impl From<TransportError> for DedupError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => DedupError::Cancelled,
            other => DedupError::Transport(other),
        }
    }
}

/// Registry bookkeeping errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("fingerprint already pending: {0}")]
    AlreadyPending(Fingerprint),
}

/// Result type for dedup operations.
pub type DedupResult<T> = Result<T, DedupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_skip_safe_methods() {
        let settings = DedupSettings::default();
        assert_eq!(settings.window(), Duration::from_millis(500));
        assert!(settings.methods().is_none());
        assert!(!settings.should_dedup(&Method::GET));
        assert!(!settings.should_dedup(&Method::HEAD));
        assert!(!settings.should_dedup(&Method::OPTIONS));
        assert!(settings.should_dedup(&Method::POST));
        assert!(settings.should_dedup(&Method::PUT));
        assert!(settings.should_dedup(&Method::PATCH));
        assert!(settings.should_dedup(&Method::DELETE));
    }

    #[test]
    fn test_explicit_methods() {
        let settings = DedupSettings::default().with_methods([Method::POST]);
        assert!(settings.should_dedup(&Method::POST));
        assert!(!settings.should_dedup(&Method::DELETE));
    }

    #[test]
    fn test_from_config() {
        let config = DedupConfig {
            window_ms: 250,
            methods: Some(vec!["post".into(), "PUT".into()]),
        };
        let settings = DedupSettings::from_config(&config).unwrap();
        assert_eq!(settings.window(), Duration::from_millis(250));
        assert_eq!(settings.methods().map(HashSet::len), Some(2));
        assert!(settings.should_dedup(&Method::POST));
        assert!(settings.should_dedup(&Method::PUT));
        assert!(!settings.should_dedup(&Method::PATCH));

        let zero = DedupConfig {
            window_ms: 0,
            methods: None,
        };
        assert_eq!(DedupSettings::from_config(&zero), Err(ValidationError::ZeroWindow));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            DedupSettings::default().with_window(Duration::ZERO),
            Err(ValidationError::ZeroWindow)
        );

        let settings = DedupSettings::default()
            .with_window(Duration::from_millis(1))
            .unwrap();
        assert_eq!(settings.window(), Duration::from_millis(1));
    }

    #[test]
    fn test_error_display_and_classification() {
        let err = DedupError::Duplicate {
            descriptor: Box::new(RequestDescriptor::post("/orders")),
        };
        assert_eq!(err.to_string(), "request already in progress: POST /orders");
        assert!(err.is_duplicate());
        assert!(err.is_silent());
        assert_eq!(err.descriptor().unwrap().url(), "/orders");

        let err = DedupError::from(TransportError::Cancelled);
        assert!(err.is_cancellation());

        let err = DedupError::from(TransportError::Network("reset".into()));
        assert!(!err.is_silent());
        assert_eq!(err.to_string(), "network error: reset");
    }
}
