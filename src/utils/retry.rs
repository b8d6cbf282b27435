use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::event_sourcing::StoreError;

// ============================================================================
// Retry on optimistic-lock conflicts
// ============================================================================
//
// The store never retries by itself. A command handler that lost a save race
// has to reload the aggregate and re-run its command; this helper runs that
// loop with exponential backoff. Only errors that report themselves as
// retryable (`IsRetryable`) are retried, everything else is returned at once.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.multiplier).min(self.max_delay)
    }
}

/// Whether an error may go away if the operation is attempted again.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for StoreError {
    fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error or
/// `config.max_attempts` is exhausted. The closure receives the 1-based
/// attempt number and must reload whatever state it depends on.
pub async fn retry_on_conflict<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Succeeded after conflict retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Conflict, reloading and retrying"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                delay = config.next_delay(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
