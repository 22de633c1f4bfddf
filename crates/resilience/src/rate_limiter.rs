// crates/resilience/src/rate_limiter.rs
//! Per-source rate limiting with interchangeable algorithms

use crate::delay;
use crate::error::{ResilienceError, ResilienceResult};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Rate limiting algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
    /// Continuous refill; each call consumes one token
    TokenBucket,
    /// Timestamp log over a moving window
    SlidingWindow,
    /// Counter reset at discrete window boundaries
    FixedWindow,
}

/// Per-source rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    max_requests: usize,
    window: Duration,
    strategy: RateLimitStrategy,
}

impl RateLimitConfig {
    /// Creates a token-bucket configuration
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            strategy: RateLimitStrategy::TokenBucket,
        }
    }

    /// Sets the algorithm
    pub fn with_strategy(mut self, strategy: RateLimitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Gets the maximum number of requests per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Gets the time window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Gets the algorithm
    pub fn strategy(&self) -> RateLimitStrategy {
        self.strategy
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, Duration::from_secs(60))
    }
}

/// Snapshot of a source's current limit state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Source the status describes
    pub provider_id: String,
    /// Calls still admissible right now
    pub remaining: usize,
    /// Configured per-window maximum
    pub limit: usize,
    /// Time until at least one call becomes admissible
    pub reset_in: Duration,
    /// True when the next call would be denied
    pub is_limited: bool,
}

#[derive(Debug)]
enum LimiterState {
    TokenBucket { tokens: f64, last_refill: Instant },
    SlidingWindow { requests: VecDeque<Instant> },
    FixedWindow { count: usize, window_start: Instant },
}

impl LimiterState {
    fn for_config(config: &RateLimitConfig) -> Self {
        let now = Instant::now();
        match config.strategy {
            RateLimitStrategy::TokenBucket => Self::TokenBucket {
                tokens: config.max_requests as f64,
                last_refill: now,
            },
            RateLimitStrategy::SlidingWindow => Self::SlidingWindow {
                requests: VecDeque::new(),
            },
            RateLimitStrategy::FixedWindow => Self::FixedWindow {
                count: 0,
                window_start: now,
            },
        }
    }
}

#[derive(Debug)]
struct ProviderLimiter {
    config: RateLimitConfig,
    state: LimiterState,
    last_activity: Instant,
}

impl ProviderLimiter {
    fn new(config: RateLimitConfig) -> Self {
        let state = LimiterState::for_config(&config);
        Self {
            config,
            state,
            last_activity: Instant::now(),
        }
    }

    fn refill_rate(&self) -> f64 {
        self.config.max_requests as f64 / self.config.window.as_secs_f64()
    }
}

/// Per-source rate limiter.
///
/// Sources are keyed by provider id; a source not configured explicitly is
/// materialized with the limiter's default configuration on first use.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    default_config: RateLimitConfig,
    providers: Arc<Mutex<HashMap<String, ProviderLimiter>>>,
}

impl RateLimiter {
    /// Creates a limiter with the default configuration for unknown sources
    pub fn new() -> Self {
        Self::with_default_config(RateLimitConfig::default())
    }

    /// Creates a limiter with a custom default configuration
    pub fn with_default_config(config: RateLimitConfig) -> Self {
        Self {
            default_config: config,
            providers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers (or replaces) a source's configuration, resetting its
    /// runtime state.
    pub fn set_config(&self, provider_id: &str, config: RateLimitConfig) {
        if let Ok(mut providers) = self.providers.lock() {
            providers.insert(provider_id.to_string(), ProviderLimiter::new(config));
        }
    }

    /// Attempts to consume one slot for the source. Returns true if the
    /// call is admitted.
    pub fn check_limit(&self, provider_id: &str) -> bool {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let entry = providers
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderLimiter::new(self.default_config.clone()));

        let now = Instant::now();
        entry.last_activity = now;
        let max = entry.config.max_requests;
        let window = entry.config.window;
        let rate = entry.refill_rate();

        let allowed = match &mut entry.state {
            LimiterState::TokenBucket {
                tokens,
                last_refill,
            } => {
                let elapsed = now.duration_since(*last_refill).as_secs_f64();
                *tokens = (*tokens + elapsed * rate).min(max as f64);
                *last_refill = now;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
            LimiterState::SlidingWindow { requests } => {
                let cutoff = now - window;
                while let Some(&oldest) = requests.front() {
                    if oldest < cutoff {
                        requests.pop_front();
                    } else {
                        break;
                    }
                }
                if requests.len() < max {
                    requests.push_back(now);
                    true
                } else {
                    false
                }
            }
            LimiterState::FixedWindow {
                count,
                window_start,
            } => {
                if now.duration_since(*window_start) >= window {
                    *count = 0;
                    *window_start = now;
                }
                if *count < max {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !allowed {
            debug!("rate limit denied call for {}", provider_id);
        }
        allowed
    }

    /// Attempts to consume one slot, returning an error on denial
    pub fn try_acquire(&self, provider_id: &str) -> ResilienceResult<()> {
        if self.check_limit(provider_id) {
            Ok(())
        } else {
            let (limit, window) = self
                .providers
                .lock()
                .ok()
                .and_then(|p| {
                    p.get(provider_id)
                        .map(|e| (e.config.max_requests, e.config.window))
                })
                .unwrap_or((self.default_config.max_requests, self.default_config.window));
            Err(ResilienceError::RateLimitExceeded {
                provider: provider_id.to_string(),
                limit,
                window,
            })
        }
    }

    /// Computes the source's current status without consuming a slot.
    ///
    /// For token buckets the hypothetical refill is recomputed from elapsed
    /// time; no state is mutated.
    pub fn status(&self, provider_id: &str) -> RateLimitStatus {
        let providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(_) => {
                return RateLimitStatus {
                    provider_id: provider_id.to_string(),
                    remaining: 0,
                    limit: self.default_config.max_requests,
                    reset_in: Duration::ZERO,
                    is_limited: true,
                }
            }
        };

        let Some(entry) = providers.get(provider_id) else {
            // Untouched source: full capacity under the default config.
            return RateLimitStatus {
                provider_id: provider_id.to_string(),
                remaining: self.default_config.max_requests,
                limit: self.default_config.max_requests,
                reset_in: Duration::ZERO,
                is_limited: false,
            };
        };

        let now = Instant::now();
        let max = entry.config.max_requests;
        let window = entry.config.window;

        let (remaining, reset_in) = match &entry.state {
            LimiterState::TokenBucket {
                tokens,
                last_refill,
            } => {
                let rate = entry.refill_rate();
                let elapsed = now.duration_since(*last_refill).as_secs_f64();
                let hypothetical = (*tokens + elapsed * rate).min(max as f64);
                let remaining = hypothetical.floor() as usize;
                let reset_in = if hypothetical >= 1.0 || rate <= 0.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64((1.0 - hypothetical) / rate)
                };
                (remaining, reset_in)
            }
            LimiterState::SlidingWindow { requests } => {
                let cutoff = now - window;
                let in_window: Vec<Instant> = requests
                    .iter()
                    .copied()
                    .filter(|&t| t >= cutoff)
                    .collect();
                let remaining = max.saturating_sub(in_window.len());
                let reset_in = if remaining > 0 {
                    Duration::ZERO
                } else {
                    in_window
                        .first()
                        .map(|&oldest| (oldest + window).saturating_duration_since(now))
                        .unwrap_or(Duration::ZERO)
                };
                (remaining, reset_in)
            }
            LimiterState::FixedWindow {
                count,
                window_start,
            } => {
                if now.duration_since(*window_start) >= window {
                    (max, Duration::ZERO)
                } else {
                    let remaining = max.saturating_sub(*count);
                    let reset_in = if remaining > 0 {
                        Duration::ZERO
                    } else {
                        (*window_start + window).saturating_duration_since(now)
                    };
                    (remaining, reset_in)
                }
            }
        };

        RateLimitStatus {
            provider_id: provider_id.to_string(),
            remaining,
            limit: max,
            reset_in,
            is_limited: remaining == 0,
        }
    }

    /// Suspends until the source is no longer limited. Returns immediately
    /// when a slot is already available.
    pub async fn wait_for_slot(&self, provider_id: &str) {
        let status = self.status(provider_id);
        if status.is_limited {
            debug!(
                "waiting {:?} for a slot on {}",
                status.reset_in, provider_id
            );
            delay::sleep_for(status.reset_in).await;
        }
    }

    /// Runs an operation once a slot is available: check, wait when denied,
    /// re-check. Bounded only by eventual slot availability.
    pub async fn execute<F, Fut, T>(&self, provider_id: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        while !self.check_limit(provider_id) {
            self.wait_for_slot(provider_id).await;
        }
        operation().await
    }

    /// Reconciles local token-bucket state with server-reported limit
    /// headers. No-op for sliding-window and fixed-window sources.
    ///
    /// Header names are matched case-insensitively across the common
    /// spellings (`x-ratelimit-remaining`, `x-rate-limit-remaining`,
    /// `ratelimit-remaining`, and the `-limit` equivalents).
    pub fn update_from_headers(&self, provider_id: &str, headers: &HashMap<String, String>) {
        const REMAINING_HEADERS: [&str; 3] = [
            "x-ratelimit-remaining",
            "x-rate-limit-remaining",
            "ratelimit-remaining",
        ];
        const LIMIT_HEADERS: [&str; 3] =
            ["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"];

        let lowered: HashMap<String, &str> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| lowered.get(*n))
                .and_then(|v| v.trim().parse::<usize>().ok())
        };

        let reported_remaining = find(&REMAINING_HEADERS);
        let reported_limit = find(&LIMIT_HEADERS);
        if reported_remaining.is_none() && reported_limit.is_none() {
            return;
        }

        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let entry = providers
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderLimiter::new(self.default_config.clone()));

        if !matches!(entry.state, LimiterState::TokenBucket { .. }) {
            return;
        }

        if let Some(limit) = reported_limit {
            if limit > 0 {
                entry.config.max_requests = limit;
            }
        }
        if let LimiterState::TokenBucket {
            tokens,
            last_refill,
        } = &mut entry.state
        {
            let cap = entry.config.max_requests as f64;
            if let Some(remaining) = reported_remaining {
                *tokens = (remaining as f64).min(cap);
                *last_refill = Instant::now();
                debug!(
                    "reconciled {} token bucket to {} remaining",
                    provider_id, remaining
                );
            } else {
                *tokens = (*tokens).min(cap);
            }
        }
    }

    /// Drops sliding-window and fixed-window state for sources idle longer
    /// than `max_idle`. Token buckets are kept; their refill state stays
    /// meaningful across idle periods. Returns the number of entries
    /// removed.
    pub fn purge_stale(&self, max_idle: Duration) -> usize {
        let mut providers = match self.providers.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        let now = Instant::now();
        let before = providers.len();
        providers.retain(|_, entry| {
            matches!(entry.state, LimiterState::TokenBucket { .. })
                || now.duration_since(entry.last_activity) < max_idle
        });
        let removed = before - providers.len();
        if removed > 0 {
            debug!("purged {} stale rate limiter entries", removed);
        }
        removed
    }

    /// Spawns the periodic cleanup sweep on its own timer, decoupled from
    /// sync cycles. The returned handle can be aborted on shutdown.
    pub fn start_cleanup(&self, period: Duration, max_idle: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it so the first sweep
            // happens one full period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.purge_stale(max_idle);
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
