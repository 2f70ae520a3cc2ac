//! Transport abstraction for tile requests.
//!
//! [`HttpTransport`] performs blocking HTTP GETs with reqwest.
//! [`MemoryTransport`] serves canned responses and records every request,
//! which lets the whole pipeline run offline.

use crate::{DemError, TileError};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// User-Agent sent with every HTTP request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; demfill/",
    env!("CARGO_PKG_VERSION"),
    "; +https://maps.gsi.go.jp/)"
);

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text. Empty for non-success statuses.
    pub body: String,
}

impl TransportResponse {
    /// A 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// A bodiless response with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs tile GET requests.
///
/// A completed request with any status is `Ok`; `Err` is reserved for
/// requests that produced no response (timeout, connection failure).
pub trait TileTransport: Send + Sync {
    /// GET `url`, giving up after `timeout`.
    fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TileError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport with [`DEFAULT_USER_AGENT`].
    pub fn new() -> crate::Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a transport sending a custom User-Agent.
    pub fn with_user_agent(user_agent: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| DemError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// The User-Agent header value.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl TileTransport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TileError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(TransportResponse::status(status.as_u16()));
        }

        let body = response.text().map_err(request_error)?;
        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn request_error(e: reqwest::Error) -> TileError {
    if e.is_timeout() {
        TileError::Timeout
    } else {
        TileError::Transport(e.to_string())
    }
}

/// In-memory transport serving canned responses.
///
/// Lookup order is exact URL, then the longest matching prefix. Anything
/// else is a 404.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    exact: HashMap<String, TransportResponse>,
    prefixes: Vec<(String, TransportResponse)>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    /// Empty transport: every request is a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for exactly `url`.
    pub fn with_response(mut self, url: impl Into<String>, response: TransportResponse) -> Self {
        self.exact.insert(url.into(), response);
        self
    }

    /// Serve a 200 with `body` for exactly `url`.
    pub fn with_tile(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_response(url, TransportResponse::ok(body))
    }

    /// Serve `response` for every URL starting with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>, response: TransportResponse) -> Self {
        self.prefixes.push((prefix.into(), response));
        self
    }

    /// Every URL requested so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn requests_with_prefix(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }

    fn lookup(&self, url: &str) -> Option<&TransportResponse> {
        self.exact.get(url).or_else(|| {
            self.prefixes
                .iter()
                .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, response)| response)
        })
    }
}

impl TileTransport for MemoryTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<TransportResponse, TileError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(self
            .lookup(url)
            .cloned()
            .unwrap_or_else(|| TransportResponse::status(404)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport_lookup() {
        let transport = MemoryTransport::new()
            .with_tile("mem://a/1/2/3.txt", "exact")
            .with_prefix("mem://a/", TransportResponse::ok("short"))
            .with_prefix("mem://a/1/", TransportResponse::ok("long"))
            .with_prefix("mem://b/", TransportResponse::status(503));

        let timeout = Duration::from_secs(1);
        assert_eq!(transport.get("mem://a/1/2/3.txt", timeout).unwrap().body, "exact");
        assert_eq!(transport.get("mem://a/1/9/9.txt", timeout).unwrap().body, "long");
        assert_eq!(transport.get("mem://a/2/9/9.txt", timeout).unwrap().body, "short");
        assert_eq!(transport.get("mem://b/0/0/0.txt", timeout).unwrap().status, 503);
        assert_eq!(transport.get("mem://c/0/0/0.txt", timeout).unwrap().status, 404);

        assert_eq!(transport.request_count(), 5);
        assert_eq!(transport.requests_with_prefix("mem://a/"), 3);
        assert_eq!(transport.requests()[0], "mem://a/1/2/3.txt");
    }

    #[test]
    fn test_response_success_range() {
        assert!(TransportResponse::ok("").is_success());
        assert!(!TransportResponse::status(404).is_success());
        assert!(!TransportResponse::status(302).is_success());
    }

    #[test]
    fn test_user_agent() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0 (compatible; demfill/"));
        let transport = HttpTransport::with_user_agent("custom/1.0").unwrap();
        assert_eq!(transport.user_agent(), "custom/1.0");
    }
}
