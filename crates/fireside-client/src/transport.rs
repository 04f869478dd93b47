//! HTTP transport collaborator.
//!
//! The engine never opens sockets itself; it hands a method, URL, headers,
//! and body to a [`Transport`] and receives a status plus body back. Retry
//! and backoff policy belong to the transport, never to the engine.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Opaque transport failure, propagated to callers uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {reason}")]
pub struct TransportError {
    /// Transport-defined description of the failure.
    pub reason: String,
}

impl TransportError {
    /// Wrap a transport-defined failure description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// An HTTP response as the engine sees it.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, already parsed as JSON (`Null` for empty bodies).
    pub body: Value,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request and returns the response.
///
/// Implementations own connection pooling, TLS, retries, and timeouts. The
/// engine issues exactly one call per logical operation and never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `method` to `url` with the given headers and optional JSON body.
    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError> {
        (**self).send(method, url, headers, body).await
    }
}
