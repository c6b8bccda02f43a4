//! Bounded retry with exponential backoff.
//!
//! Every outbound request goes through [`retry`]. The predicate decides which
//! errors are worth another attempt: idempotent uploads retry connection
//! failures and timeouts ([`ReleaseError::is_transient`](crate::error::ReleaseError::is_transient)),
//! POSTs that create something retry only requests that never reached the
//! server ([`ReleaseError::is_undelivered`](crate::error::ReleaseError::is_undelivered)).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt limit and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and no waiting, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait after failed attempt number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out.
///
/// `op` receives the 0-based attempt number. The last error is returned when
/// every attempt failed.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt + 1 < max_attempts => {
                let delay = policy.delay(attempt);
                log::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
