// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant operations
//!
//! This crate provides the failure-handling building blocks the sync
//! engine composes around every external call:
//! - Retry with constant, linear, or exponential backoff
//! - Per-source rate limiting (token bucket, sliding window, fixed window)
//! - Timeout handling
//! - Cancellable scheduled delays
//!
//! # Example
//!
//! ```rust
//! use marksync_resilience::{RateLimitConfig, RateLimiter, RetryPolicy};
//! use std::time::Duration;
//!
//! // Retry with exponential backoff
//! let policy = RetryPolicy::new(3)
//!     .with_initial_delay(Duration::from_millis(100));
//!
//! // Per-source rate limiting
//! let limiter = RateLimiter::new();
//! limiter.set_config("github", RateLimitConfig::new(30, Duration::from_secs(60)));
//! assert!(limiter.check_limit("github"));
//! ```

mod delay;
mod error;
mod rate_limiter;
mod retry;
mod timeout;

pub use delay::{sleep_for, DelayHandle, ScheduledDelay};
pub use error::{ResilienceError, ResilienceResult};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimitStrategy, RateLimiter};
pub use retry::{
    execute, execute_with, retry_on, with_retry, BackoffStrategy, ClassifyError, ErrorClass,
    RetryPolicy, RetryResult,
};
pub use timeout::{with_timeout, Timeout};
