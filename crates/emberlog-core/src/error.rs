use thiserror::Error;

/// Why an untrusted payload could not become an [`Incident`](crate::incident::Incident).
#[derive(Debug, Error)]
pub enum IncidentError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("payload does not match the incident schema: {0}")]
    Schema(serde_json::Error),

    #[error("source_audio is not a valid URL: {url}")]
    InvalidAudioUrl { url: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// A page request the API would refuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("page must be at least 1, got {0}")]
    InvalidPage(u32),

    #[error("page_size must be at least 1, got {0}")]
    InvalidPageSize(u32),
}

pub type IncidentResult<T> = Result<T, IncidentError>;
