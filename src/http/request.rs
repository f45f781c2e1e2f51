//! Request descriptors handed to the manager by callers.
//!
//! # Responsibilities
//! - Describe one outgoing call (method, URL, JSON body, query params)
//! - Carry per-request headers and the dedup opt-out flag
//! - Convert caller payloads into JSON values up front
//!
//! # Design Decisions
//! - Descriptors are immutable once built; builder methods consume `self`
//! - Bodies are stored as `serde_json::Value` so key building never fails on
//!   serialization
//! - Headers and `skip_dedup` never take part in request identity

use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::dedup::DedupError;

/// Header carrying the per-submission correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// An immutable description of one HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    body: Option<Value>,
    query: Option<BTreeMap<String, String>>,
    headers: BTreeMap<String, String>,
    skip_dedup: bool,
}

impl RequestDescriptor {
    /// Create a descriptor with no body, params or headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            query: None,
            headers: BTreeMap::new(),
            skip_dedup: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Attach a serializable payload as the JSON body.
    ///
    /// Fails with [`DedupError::InvalidDescriptor`] when the payload cannot be
    /// represented as JSON (e.g. a map with non-string keys).
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, DedupError> {
        let value = serde_json::to_value(body)
            .map_err(|e| DedupError::InvalidDescriptor(format!("body is not serializable: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Attach an already-built JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a single query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters.
    pub fn with_query_map(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = Some(query);
        self
    }

    /// Add a header. Names are stored lowercase.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Opt this request out of deduplication.
    pub fn skip_dedup(mut self) -> Self {
        self.skip_dedup = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn query(&self) -> Option<&BTreeMap<String, String>> {
        self.query.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Whether the caller opted out of deduplication for this request.
    pub fn skips_dedup(&self) -> bool {
        self.skip_dedup
    }
}
