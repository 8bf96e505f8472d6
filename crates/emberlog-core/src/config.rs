use crate::error::ConfigError;
use url::Url;

pub const API_BASE_ENV: &str = "EMBERLOG_API_BASE";
pub const DEFAULT_API_BASE: &str = "http://localhost:8080";
pub const INCIDENTS_PATH: &str = "/api/v1/incidents";
pub const STREAM_PATH: &str = "/api/v1/sse/incidents";

/// Where the remote incidents API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
}

impl ApiConfig {
    /// Accepts an absolute http(s) base. Trailing slashes are dropped; a blank
    /// value falls back to [`DEFAULT_API_BASE`].
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let candidate = if trimmed.is_empty() { DEFAULT_API_BASE } else { trimmed };

        let parsed = Url::parse(candidate).map_err(|e| ConfigError::InvalidBaseUrl {
            url: candidate.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: candidate.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: candidate.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn incidents_url(&self) -> String {
        format!("{}{}", self.base_url, INCIDENTS_PATH)
    }

    pub fn stream_url(&self) -> String {
        format!("{}{}", self.base_url, STREAM_PATH)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}
