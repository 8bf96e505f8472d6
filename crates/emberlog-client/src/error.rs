use emberlog_core::QueryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Failed to fetch incidents ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response from incidents API: {0}")]
    InvalidResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
