use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Expected status {expected}, got {actual}: {body}")]
    UnexpectedStatus {
        expected: StatusCode,
        actual: StatusCode,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Service returned an empty token")]
    EmptyToken,

    #[error("Invalid base URL `{0}`")]
    InvalidBaseUrl(String),
}

impl ShopError {
    /// Status code returned by the service, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ShopError::UnexpectedStatus { actual, .. } => Some(*actual),
            ShopError::Http(err) => err.status(),
            _ => None,
        }
    }
}
