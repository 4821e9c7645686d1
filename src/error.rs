//! Error types for Scout
//!
//! Gateway errors are classified at the point they are produced so the retry
//! layer only has to ask [`ScoutError::is_transient`].

use thiserror::Error;

/// Result type alias used across the library
pub type Result<T> = std::result::Result<T, ScoutError>;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// Provider throttled the request (HTTP 429, ThrottlingException)
    #[error("Rate limited by model provider: {0}")]
    RateLimited(String),

    /// Provider temporarily unavailable (HTTP 503/529, ServiceUnavailable)
    #[error("Model service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other model provider failure
    #[error("Model error: {0}")]
    Llm(String),

    /// Transport-level failure (connect/read timeout, DNS, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A record failed validation (ingestion rows, enum parsing)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ScoutError {
    /// Whether the gateway should retry the call that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(self, ScoutError::RateLimited(_) | ScoutError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ScoutError::RateLimited("429".into()).is_transient());
        assert!(ScoutError::ServiceUnavailable("503".into()).is_transient());
        assert!(!ScoutError::Llm("400 bad request".into()).is_transient());
        assert!(!ScoutError::Retrieval("index offline".into()).is_transient());
    }
}
