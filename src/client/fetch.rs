//! The request primitive the client is built on
//!
//! The host decides where a path goes and how it is authenticated; the client
//! only ever hands over a relative path, a JSON body and a few options.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    Get,
    #[default]
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// How the response body should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
}

/// Per-request options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    /// Whether the host should raise its own error notification on failure
    pub show_error_alert: bool,
}

impl FetchOptions {
    /// JSON request with host-level error alerts suppressed
    pub fn json(method: Method) -> Self {
        Self {
            method,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            response_type: ResponseType::Json,
            show_error_alert: false,
        }
    }

    /// Append extra headers after the defaults
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub data: Value,
}

/// Failed request: either a non-2xx response or a transport failure
#[derive(Debug, Clone, PartialEq, Error)]
pub struct FetchError {
    /// `None` when no response was received at all
    pub status: Option<u16>,
    /// Decoded body, or the transport error text
    pub data: Value,
}

impl FetchError {
    pub fn with_status(status: u16, data: Value) -> Self {
        Self {
            status: Some(status),
            data,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            data: Value::String(message.into()),
        }
    }

    /// The `detail` field of a JSON error body
    pub fn detail(&self) -> Option<&str> {
        self.data.get("detail").and_then(Value::as_str)
    }

    /// Human readable message: a string body wins, then `detail`, then a
    /// generic fallback
    pub fn message(&self) -> String {
        if let Value::String(body) = &self.data {
            return body.clone();
        }
        match self.detail() {
            Some(detail) if !detail.is_empty() => detail.to_string(),
            _ => "Unknown error".to_string(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "Request failed with status {status}: {}", self.message()),
            None => write!(f, "Request failed: {}", self.message()),
        }
    }
}

/// Injected HTTP capability
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issue a request against `path`, relative to the assistant resource root
    async fn fetch(
        &self,
        path: &str,
        body: Value,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch(
        &self,
        path: &str,
        body: Value,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        (**self).fetch(path, body, options).await
    }
}

/// Logging wrapper for fetch implementations
pub struct LoggingFetch {
    inner: Arc<dyn Fetch>,
}

impl LoggingFetch {
    pub fn new(inner: Arc<dyn Fetch>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Fetch for LoggingFetch {
    async fn fetch(
        &self,
        path: &str,
        body: Value,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let result = self.inner.fetch(path, body, options).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    method = options.method.as_str(),
                    path = %path,
                    status = response.status,
                    duration_ms = %duration.as_millis(),
                    "Assistant request completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    method = options.method.as_str(),
                    path = %path,
                    status = ?e.status,
                    duration_ms = %duration.as_millis(),
                    error = %e.message(),
                    "Assistant request failed"
                );
            }
        }

        result
    }
}
