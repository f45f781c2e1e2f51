//! Request fingerprinting.
//!
//! A fingerprint is `method:url:body:query` where the method is lowercased,
//! whitespace is stripped from method and URL, and body/query are compact JSON
//! with object keys sorted at every depth. Absent, `null` and `{}` bodies all
//! render as `{}`, as do absent and empty query maps.

use std::fmt;

use serde_json::Value;

use crate::dedup::types::DedupError;
use crate::http::request::RequestDescriptor;

const EMPTY: &str = "{}";

/// Canonical identity of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint of a descriptor.
pub fn build_key(descriptor: &RequestDescriptor) -> Result<Fingerprint, DedupError> {
    let url = strip_whitespace(descriptor.url());
    if url.is_empty() {
        return Err(DedupError::InvalidDescriptor("URL is empty".to_string()));
    }
    let method = strip_whitespace(descriptor.method().as_str()).to_ascii_lowercase();

    let body = match descriptor.body() {
        None | Some(Value::Null) => EMPTY.to_string(),
        Some(value) => canonical_json(value)?,
    };

    let query = match descriptor.query() {
        Some(query) if !query.is_empty() => serde_json::to_string(query).map_err(invalid)?,
        _ => EMPTY.to_string(),
    };

    Ok(Fingerprint(format!("{}:{}:{}:{}", method, url, body, query)))
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn invalid(err: serde_json::Error) -> DedupError {
    DedupError::InvalidDescriptor(format!("cannot serialize request: {}", err))
}

/// Compact JSON with sorted object keys, independent of how the map was built.
fn canonical_json(value: &Value) -> Result<String, DedupError> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), DedupError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).map_err(invalid)?);
                out.push(':');
                write_canonical(item, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar).map_err(invalid)?),
    }
    Ok(())
}
