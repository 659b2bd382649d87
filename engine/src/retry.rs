//! Exponential backoff for transient store failures.
//!
//! - Max retries: 2 (3 total attempts)
//! - Initial delay: 50ms, doubling per retry
//! - Max delay: 500ms
//!
//! Only [`wordchain_store::StoreError::is_transient`] failures are retried. The caller runs on
//! a blocking thread, so the backoff sleeps the thread.

use std::time::Duration;

use tracing::warn;
use wordchain_config::RetryConfig;
use wordchain_store::StoreResult;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `step` (0-based).
    #[must_use]
    pub fn delay_for(&self, step: u32) -> Duration {
        let factor = 1_u32 << step.min(16);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying transient failures.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> StoreResult<T>) -> StoreResult<T> {
        let mut step = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && step < self.max_retries => {
                    let delay = self.delay_for(step);
                    warn!(
                        op = what,
                        attempt = step + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    step += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
