//! Exponential backoff for flaky calls.
//!
//! The delay before retry `n` (0-indexed) is
//!
//! ```text
//! delay = min(base_delay * multiplier^n, max_delay) + random_jitter(0..=jitter)
//! ```
//!
//! When every attempt fails, the last error is returned untouched so callers
//! can still match on it.

use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means a single call.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound for the exponential part, if any.
    pub max_delay: Option<Duration>,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Some(Duration::from_secs(30)),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// The deterministic part of the delay before retry `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng().random_range(0..=jitter_ms))
        };
        self.backoff(attempt).saturating_add(jitter)
    }
}

/// Run `op` until it succeeds or the policy runs out of retries.
///
/// # Arguments
///
/// * `policy` - Retry count and delay schedule
/// * `label` - Short name of the operation, used in log lines
/// * `op` - Produces a fresh future for every attempt
///
/// # Returns
///
/// The first successful value, or the error from the final attempt.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    with_retry_when(policy, label, op, |_| true).await
}

/// Like [`with_retry`], but an error for which `retryable` returns `false`
/// is returned at once.
pub async fn with_retry_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let total_t0 = Instant::now();
    let mut attempt = 0u32;

    loop {
        let attempt_t0 = Instant::now();
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let attempt_dt = attempt_t0.elapsed();
                if !retryable(&e) {
                    warn!(op = label, attempt = attempt + 1, error = %e, "Attempt failed; not retryable");
                    return Err(e);
                }
                if attempt >= policy.max_retries {
                    error!(
                        op = label,
                        attempts = attempt + 1,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }

                let delay = policy.delay_with_jitter(attempt);
                warn!(
                    op = label,
                    attempt = attempt + 1,
                    max = policy.max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis(),
                    ?delay,
                    error = %e,
                    "Attempt failed; backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
