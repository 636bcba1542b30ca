use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Rate limit exceeded, please try again later")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Unknown {0}")]
    InvalidDimension(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl AppError {
    /// Transient upstream failures. These are never written to the cache.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable(_) | AppError::RateLimited)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::JsonError(e.to_string())
    }
}
