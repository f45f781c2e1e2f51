//! Transport adapters.
//!
//! # Responsibilities
//! - Define the seam between the dedup pipeline and network I/O
//! - Perform the actual HTTP call with `reqwest`
//! - Abort promptly when the cancellation token fires
//!
//! # Design Decisions
//! - The transport never sees fingerprints; it only gets a descriptor and a token
//! - Non-2xx responses are errors, carrying status and body
//! - Timeouts are distinct from other network failures

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::http::request::{RequestDescriptor, X_REQUEST_ID};
use crate::http::response::TransportResponse;

/// Errors reported by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The transport's own request timeout elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The descriptor could not be turned into a request (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The call was aborted through its cancellation token.
    #[error("request cancelled")]
    Cancelled,
}

/// Underlying HTTP client wrapped by the dedup manager.
///
/// Implementations must stop the network operation soon after `cancel`
/// fires and report [`TransportError::Cancelled`].
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        (**self).execute(request, cancel)
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<Url>,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = match &config.base_url {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                TransportError::InvalidRequest(format!("invalid base_url '{}': {}", raw, e))
            })?),
            None => None,
        };
        let timeout = Duration::from_secs(config.timeout_secs);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Resolve a descriptor URL, joining relative paths onto the base URL.
    pub fn resolve_url(&self, url: &str) -> Result<Url, TransportError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(url).map_err(|e| {
                    TransportError::InvalidRequest(format!("cannot join '{}' onto base: {}", url, e))
                }),
                None => Err(TransportError::InvalidRequest(format!(
                    "relative URL '{}' requires a base_url",
                    url
                ))),
            },
            Err(e) => Err(TransportError::InvalidRequest(format!("invalid URL '{}': {}", url, e))),
        }
    }

    async fn dispatch(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
        let url = self.resolve_url(request.url())?;
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .cloned()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .header(X_REQUEST_ID, request_id.as_str());

        for (name, value) in request.headers() {
            if name != X_REQUEST_ID {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(query) = request.query() {
            builder = builder.query(query);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        tracing::trace!(request_id = %request_id, method = %request.method(), url = %request.url(), "Dispatching request");

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.dispatch(request) => result,
        }
    }
}
