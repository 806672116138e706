//! Retry with exponential backoff.
//!
//! `RetryPolicy` describes how many attempts to make and how long to wait
//! between them; `retry_with_backoff` applies it to any fallible async
//! operation. The delay after attempt `n` (1-based) is
//! `min(base_delay * 2^(n-1), max_delay)`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's attempts are used up. The last error is returned on failure.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, max_attempts, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
