//! Helpers shared by the HTTP store adapters.
//!
//! HTTP client creation, URL validation, mapping of HTTP failures onto the
//! crate error type, and extraction of record ids from JSON documents.

use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Default HTTP timeout for all adapters.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which side of the pipeline an HTTP failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSide {
    /// Source (document) store.
    Source,
    /// Target (REST) store.
    Target,
}

impl StoreSide {
    /// Wraps a message in the error variant for this side.
    pub fn error(self, message: String) -> Error {
        match self {
            Self::Source => Error::SourceStore(message),
            Self::Target => Error::TargetStore(message),
        }
    }
}

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Validates a store URL.
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));

    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }

    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Maps an HTTP error response onto the crate error type.
pub fn handle_http_error(status_code: u16, body: &str, store_name: &str, side: StoreSide) -> Error {
    match status_code {
        429 => Error::RateLimit(60),
        401 | 403 => Error::Authentication(format!("{} auth failed: {}", store_name, body)),
        _ => side.error(format!("{} error {}: {}", store_name, status_code, body)),
    }
}

/// Extracts an id from a JSON value.
///
/// Accepts strings, numbers and `{"$oid": "..."}` object ids.
pub fn extract_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
