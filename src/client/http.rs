//! `reqwest`-backed fetch implementation

use super::{Fetch, FetchError, FetchOptions, FetchResponse, Method, ResponseType};
use crate::config::{AssistantConfig, ConfigError};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpFetchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetch capability talking directly to the assistant service
pub struct HttpFetch {
    client: Client,
    base_url: String,
    authorization: String,
    headers: Vec<(String, String)>,
}

impl HttpFetch {
    pub fn new(config: &AssistantConfig) -> Result<Self, HttpFetchError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Self::with_client(client, config).map_err(HttpFetchError::from)
    }

    /// Use a preconfigured `reqwest` client (proxy, TLS roots, ...)
    pub fn with_client(client: Client, config: &AssistantConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            base_url: config.resolve_base_url()?,
            authorization: config.credentials.authorization(),
            headers: config.headers.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(
        &self,
        path: &str,
        body: Value,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let url = self.url(path);
        let method = match options.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut request = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, self.authorization.as_str());
        for (name, value) in self.headers.iter().chain(&options.headers) {
            request = request.header(name.as_str(), value.as_str());
        }
        if options.method == Method::Post {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::transport(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                FetchError::transport(format!("Connection failed: {e}"))
            } else {
                FetchError::transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::transport(format!("Failed to read response: {e}")))?;
        let data = decode_body(&text, options.response_type);

        if !status.is_success() {
            let error = FetchError::with_status(status.as_u16(), data);
            if options.show_error_alert {
                tracing::error!(url = %url, status = status.as_u16(), error = %error.message(), "Assistant request failed");
            } else {
                tracing::debug!(url = %url, status = status.as_u16(), "Assistant request failed");
            }
            return Err(error);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            data,
        })
    }
}

/// JSON when it parses, the raw text otherwise
fn decode_body(text: &str, response_type: ResponseType) -> Value {
    match response_type {
        ResponseType::Json => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
        ResponseType::Text => Value::String(text.to_string()),
    }
}
