// crates/sync-engine/src/error.rs
//! Error types for sync operations
//!
//! Every failure is tagged with its variant at the boundary where it
//! originates; retry predicates look at the variant's class instead of
//! re-inspecting error shapes downstream.

use marksync_resilience::{ClassifyError, ErrorClass, ResilienceError};
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connectivity failure reaching an upstream API
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream HTTP error carrying its status code
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Operation deadline exceeded
    #[error("Operation timed out")]
    Timeout,

    /// Credential expired or rejected upstream
    #[error("Credential expired or invalid: {0}")]
    AuthExpired(String),

    /// Source misconfiguration (missing or deleted folder)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A manual-strategy conflict is awaiting user action
    #[error("Unresolved conflict: {0}")]
    ConflictUnresolved(String),

    /// Bookmark or checkpoint store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl ClassifyError for SyncError {
    fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Network(msg) => {
                if msg.to_ascii_lowercase().contains("timeout") {
                    Some(ErrorClass::Timeout)
                } else {
                    Some(ErrorClass::Network)
                }
            }
            Self::Http { status, .. } => match status {
                429 => Some(ErrorClass::RateLimit),
                408 => Some(ErrorClass::Timeout),
                500 | 502 | 503 | 504 => Some(ErrorClass::ServerError),
                401 | 403 => Some(ErrorClass::AuthExpired),
                _ => None,
            },
            Self::Timeout => Some(ErrorClass::Timeout),
            Self::AuthExpired(_) => Some(ErrorClass::AuthExpired),
            Self::Custom(msg) if msg.to_ascii_lowercase().contains("timeout") => {
                Some(ErrorClass::Timeout)
            }
            _ => None,
        }
    }
}

impl From<ResilienceError> for SyncError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Timeout(_) => Self::Timeout,
            // A local limiter denial is the same condition as an upstream 429.
            ResilienceError::RateLimitExceeded { provider, .. } => Self::Http {
                status: 429,
                message: format!("local rate limit for {provider}"),
            },
            ResilienceError::Custom(msg) => Self::Custom(msg),
        }
    }
}
