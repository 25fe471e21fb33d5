// crates/network/src/transport.rs
//! Request/response types and the transport seam

use crate::error::GatewayResult;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

/// A call to the remote service, relative to its base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path segments below the base URL, unescaped
    pub segments: Vec<String>,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request without a body
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: None,
        }
    }

    /// Attaches a JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Renders the path for logs, e.g. `/resource/abc`
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// A raw HTTP answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text (empty for HEAD)
    pub body: String,
}

impl RawResponse {
    /// Creates a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request over the wire
///
/// Implementations only fail with `GatewayError::Transport` (or
/// `Configuration`); status handling, retries and timeouts live in the
/// gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request, attaching `bearer` as an `Authorization` header
    /// when present
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>)
        -> GatewayResult<RawResponse>;
}
