// crates/resilience/examples/resilience_demo.rs
//! Demonstration of retry and rate limiting behavior

use marksync_resilience::{
    execute, BackoffStrategy, ClassifyError, ErrorClass, RateLimitConfig, RateLimitStrategy,
    RateLimiter, RetryPolicy,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct FlakyUpstream;

impl fmt::Display for FlakyUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream hiccup")
    }
}

impl ClassifyError for FlakyUpstream {
    fn error_class(&self) -> Option<ErrorClass> {
        Some(ErrorClass::Network)
    }
}

#[tokio::main]
async fn main() {
    println!("marksync Resilience Demo");
    println!("========================\n");

    demo_retry().await;
    println!();
    demo_rate_limiting().await;
}

async fn demo_retry() {
    println!("1. Retry with Exponential Backoff");
    println!("---------------------------------");

    let policy = RetryPolicy::new(3)
        .with_initial_delay(Duration::from_millis(50))
        .with_strategy(BackoffStrategy::Exponential)
        .with_jitter(false);

    let attempts = AtomicU32::new(0);
    let outcome = execute(&policy, || {
        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  attempt {n}...");
        async move {
            if n < 3 {
                Err(FlakyUpstream)
            } else {
                Ok("fetched 42 items")
            }
        }
    })
    .await;

    println!(
        "\n✓ Succeeded after {} attempts in {:?}: {}",
        outcome.attempts,
        outcome.total_time,
        outcome.result.unwrap()
    );
}

async fn demo_rate_limiting() {
    println!("2. Per-Source Rate Limiting");
    println!("---------------------------");

    let limiter = RateLimiter::new();
    limiter.set_config(
        "github",
        RateLimitConfig::new(3, Duration::from_secs(1)),
    );
    limiter.set_config(
        "gitlab",
        RateLimitConfig::new(5, Duration::from_secs(1))
            .with_strategy(RateLimitStrategy::SlidingWindow),
    );

    println!("github: 3 requests per second (token bucket)");
    for i in 1..=4 {
        let admitted = limiter.check_limit("github");
        println!("  request {i}: {}", if admitted { "ok" } else { "denied" });
    }

    let status = limiter.status("github");
    println!(
        "\ngithub status: {}/{} remaining, resets in {:?}",
        status.remaining, status.limit, status.reset_in
    );

    println!("\nWaiting for a slot...");
    let value = limiter.execute("github", || async { "ran after refill" }).await;
    println!("✓ {value}");
}
