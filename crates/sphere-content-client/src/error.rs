//! Content store error types.

/// Errors from pinning API calls.
#[derive(Debug, thiserror::Error)]
pub enum ContentApiError {
    /// HTTP transport error, after retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service rejected the API keys.
    #[error("pinning service rejected credentials for {endpoint}")]
    Unauthorized { endpoint: String },
    /// Non-2xx status other than 401.
    #[error("pinning service {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The returned content hash could not be turned into a gateway URL.
    #[error("invalid content hash {0:?}")]
    InvalidHash(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl ContentApiError {
    /// `true` for 5xx responses and transport failures.
    pub fn is_upstream_failure(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
