// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Rate limit exceeded for a source
    #[error("Rate limit exceeded for {provider} (limit: {limit} per {window:?})")]
    RateLimitExceeded {
        provider: String,
        limit: usize,
        window: std::time::Duration,
    },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}
