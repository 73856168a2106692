//! Retry with jittered exponential backoff for storage calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storage::repository::StorageError;
use tracing::{debug, warn};

/// Retry policy for transient storage failures.
///
/// Only `StorageError::Connection` is retried. A `Conflict` is returned on
/// the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total tries including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Fraction of the delay added or removed at random.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 2_000,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based), before jitter.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn delay(&self, retry: u32) -> Duration {
        let capped = self.base_delay(retry).as_millis() as f64;
        let range = capped * self.jitter.clamp(0.0, 1.0);
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * range;
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Storage error that survived every allowed attempt.
#[derive(Debug)]
pub(crate) struct Exhausted {
    pub attempts: u32,
    pub error: StorageError,
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
pub(crate) async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    what: &'static str,
    mut op: F,
) -> Result<T, Exhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = config.delay(attempt);
                warn!(
                    op = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "storage call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                debug!(op = what, attempt, error = %error, "storage call gave up");
                return Err(Exhausted {
                    attempts: attempt,
                    error,
                });
            }
        }
    }
}
