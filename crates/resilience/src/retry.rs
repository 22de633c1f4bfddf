// crates/resilience/src/retry.rs
//! Retry executor with configurable backoff strategies

use crate::delay;
use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

/// Backoff strategy applied between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Every retry waits `initial_delay`
    Constant,
    /// Retry `n` waits `initial_delay * n`
    Linear,
    /// Retry `n` waits `initial_delay * multiplier^(n-1)`
    Exponential,
}

/// Failure classes the retry heuristic understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Connectivity failure
    Network,
    /// Upstream rate limit (HTTP 429)
    RateLimit,
    /// Upstream 5xx
    ServerError,
    /// Request or operation deadline exceeded
    Timeout,
    /// Expired or invalid credential
    AuthExpired,
    /// Other transient condition
    Transient,
}

/// Contract for errors that carry their own retry classification.
///
/// Classification happens once, where the error originates; retry
/// predicates only look at the class. `None` means not retryable.
pub trait ClassifyError {
    /// Returns the failure class, or `None` for permanent errors
    fn error_class(&self) -> Option<ErrorClass>;
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    max_retries: usize,
    /// Delay before the first retry
    initial_delay: Duration,
    /// Upper bound on any computed delay
    max_delay: Duration,
    /// Backoff strategy
    strategy: BackoffStrategy,
    /// Multiplier for exponential backoff
    multiplier: f64,
    /// Whether to apply symmetric jitter
    use_jitter: bool,
}

impl RetryPolicy {
    /// Creates a new retry policy allowing `max_retries` retries
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
            multiplier: 2.0,
            use_jitter: true,
        }
    }

    /// Sets the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff strategy
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets whether to apply jitter
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Returns the configured number of retries
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Calculates the delay before retry `attempt` (1-based).
    ///
    /// The strategy's base delay is clamped to `max_delay`, then jitter of
    /// up to ±25% is applied when enabled. The result is never negative.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let initial = self.initial_delay.as_millis() as f64;
        let base = match self.strategy {
            BackoffStrategy::Constant => initial,
            BackoffStrategy::Linear => initial * attempt as f64,
            BackoffStrategy::Exponential => {
                initial * self.multiplier.powi((attempt - 1) as i32)
            }
        };

        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.use_jitter {
            capped * rand::thread_rng().gen_range(0.75..=1.25)
        } else {
            capped
        };

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// Final value or the last error observed
    pub result: Result<T, E>,
    /// Attempts made, including the first
    pub attempts: usize,
    /// Wall time spent across all attempts and delays
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the operation eventually succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Unwraps into the underlying result, discarding attempt accounting
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Executes an operation with retries, using the error's own
/// classification to decide retryability.
pub async fn execute<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ClassifyError + std::fmt::Display,
{
    execute_with(
        policy,
        operation,
        |e: &E| e.error_class().is_some(),
        |_, _, _: &E| {},
    )
    .await
}

/// Executes an operation with retries restricted to a single error class.
///
/// Errors of any other class abort immediately.
pub async fn retry_on<F, Fut, T, E>(
    policy: &RetryPolicy,
    class: ErrorClass,
    operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ClassifyError + std::fmt::Display,
{
    execute_with(
        policy,
        operation,
        move |e: &E| e.error_class() == Some(class),
        |_, _, _: &E| {},
    )
    .await
}

/// Executes an operation with retries and returns the final value,
/// propagating the last error on exhaustion.
///
/// Convenience for call sites that want plain `?` semantics instead of a
/// [`RetryResult`].
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ClassifyError + std::fmt::Display,
{
    execute(policy, operation).await.into_result()
}

/// Executes an operation with retries, a caller-supplied retryability
/// predicate, and an observer invoked before each sleep with
/// `(attempt, delay, error)`.
pub async fn execute_with<F, Fut, T, E, P, O>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
    mut on_retry: O,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
    O: FnMut(usize, Duration, &E),
{
    let start = Instant::now();
    let mut attempt = 0usize;

    loop {
        match operation().await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_time: start.elapsed(),
                };
            }
            Err(err) => {
                if attempt >= policy.max_retries() {
                    warn!(
                        "giving up after {} attempts: {}",
                        attempt + 1,
                        err
                    );
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt + 1,
                        total_time: start.elapsed(),
                    };
                }

                if !is_retryable(&err) {
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt + 1,
                        total_time: start.elapsed(),
                    };
                }

                attempt += 1;
                let retry_delay = policy.delay_for_attempt(attempt);
                debug!(
                    "attempt {} failed ({}), retrying in {:?}",
                    attempt, err, retry_delay
                );
                on_retry(attempt, retry_delay, &err);
                delay::sleep_for(retry_delay).await;
            }
        }
    }
}
