//! Assistant connection settings
//!
//! Mirrors how the data source's backend proxies assistant calls: an explicit
//! assistant URL, or one derived from the cluster host, plus either a
//! service-account token or basic credentials.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::time::Duration;
use thiserror::Error;

/// Port the assistant listens on when only the cluster host is known
pub const DEFAULT_ASSISTANT_PORT: u16 = 4040;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Server address is missing")]
    MissingHost,
    #[error("Invalid assistant URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("Invalid request timeout: {0}")]
    InvalidTimeout(String),
}

/// How requests authenticate against the assistant
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ServiceAccount { token: String },
    Basic { username: String, password: String },
}

impl Credentials {
    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        match self {
            Credentials::ServiceAccount { token } => format!("Bearer {token}"),
            Credentials::Basic { username, password } => {
                format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
            }
        }
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ServiceAccount { .. } => f
                .debug_struct("ServiceAccount")
                .field("token", &"<redacted>")
                .finish(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Configuration for the assistant connection
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Explicit assistant root, e.g. `https://cluster.example.com:4040/assistant`
    pub base_url: Option<String>,
    /// Cluster host, used when `base_url` is not set
    pub host: Option<String>,
    pub credentials: Credentials,
    pub timeout: Duration,
    /// Extra headers sent with every assistant request
    pub headers: Vec<(String, String)>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            host: None,
            credentials: Credentials::Basic {
                username: String::new(),
                password: String::new(),
            },
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let credentials = match non_empty("HDX_CREDENTIALS_TYPE").as_deref() {
            Some("serviceAccount") => Credentials::ServiceAccount {
                token: lookup("HDX_TOKEN").unwrap_or_default(),
            },
            _ => Credentials::Basic {
                username: lookup("HDX_USERNAME").unwrap_or_default(),
                password: lookup("HDX_PASSWORD").unwrap_or_default(),
            },
        };

        let timeout = match non_empty("HDX_ASSISTANT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT,
        };

        let config = Self {
            base_url: non_empty("HDX_ASSISTANT_URL"),
            host: non_empty("HDX_HOST"),
            credentials,
            timeout,
            headers: Vec::new(),
        };
        // Fail early rather than on the first request
        config.resolve_base_url()?;
        Ok(config)
    }

    /// The assistant root every request path is joined onto
    pub fn resolve_base_url(&self) -> Result<String, ConfigError> {
        let url = match (&self.base_url, &self.host) {
            (Some(url), _) => url.clone(),
            (None, Some(host)) => format!("https://{host}:{DEFAULT_ASSISTANT_PORT}/assistant"),
            (None, None) => return Err(ConfigError::MissingHost),
        };

        reqwest::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl(url.clone(), e.to_string()))?;
        Ok(url)
    }
}
