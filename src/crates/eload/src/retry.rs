//! Bounded retries with exponential backoff and additive jitter
//!
//! Only used for third-party resolution services. Store access is never
//! retried here; callers decide whether a `StoreUnavailable` is worth another run.

use crate::config::ResolverConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Upper bound on any single wait between attempts
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,

    /// Delay before the second attempt, in seconds
    pub initial_delay_secs: f64,

    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,

    /// Extra random delay added to every wait, as `(min, max)` seconds
    pub jitter_secs: (f64, f64),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for RetryPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay_secs: config.initial_delay_secs,
            backoff_factor: config.backoff_factor,
            jitter_secs: config.jitter_secs,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-indexed), without jitter
    pub fn base_delay(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        seconds(self.initial_delay_secs * self.backoff_factor.powi(exponent))
    }

    /// Delay before retry number `retry`, with jitter
    pub fn delay(&self, retry: usize) -> Duration {
        let (min, max) = self.jitter_secs;
        let jitter = if min.is_finite() && max.is_finite() && max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        self.base_delay(retry).saturating_add(seconds(jitter)).min(MAX_DELAY)
    }
}

/// Negative and NaN become zero; anything past [`MAX_DELAY`] is clamped to it
fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the attempts run out. The last error is returned.
pub async fn with_retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    label: &str,
    should_retry: R,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = label, attempt, "Retry succeeded");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && should_retry(&e) => {
                let delay = policy.delay(attempt - 1);
                warn!(
                    operation = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "Operation failed, will retry"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(operation = label, attempt, error = %e, "Operation failed, giving up");
                return Err(e);
            }
        }
    }
}
