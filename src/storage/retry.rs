//! Busy-retry with exponential backoff.
//!
//! A step that reports contention is repeated after a delay of
//! `base_delay_ms * 2^(n-1)` for the n-th retry, up to `max_retries` times.
//! Any other error ends the operation at once.

use super::engine::{EngineError, EngineResult};
use crate::config::RetryConfig;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Blocks the calling thread between retries.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry budget plus the sleeper used to wait it out.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy that sleeps on the calling thread.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replaces the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Maximum number of retries after the first busy result.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Delay before the given 1-based retry.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        Duration::from_millis(self.config.delay_for_attempt(retry))
    }

    /// Sum of every delay when all retries are used.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        (1..=self.config.max_retries)
            .map(|n| self.delay_for_retry(n))
            .sum()
    }

    /// Runs `attempt` until it returns something other than busy or the
    /// retry budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContentionExhausted`] when the last allowed attempt
    /// is still busy and [`Error::Execution`] for any other engine failure.
    pub fn run<T, F>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> EngineResult<T>,
    {
        let mut retries = 0;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(EngineError::Busy(cause)) if retries < self.config.max_retries => {
                    retries += 1;
                    tracing::debug!(
                        operation,
                        cause = %cause,
                        "Database busy, retrying... ({retries}/{})",
                        self.config.max_retries
                    );
                    metrics::counter!("store_busy_retries_total").increment(1);
                    self.sleeper.sleep(self.delay_for_retry(retries));
                },
                Err(EngineError::Busy(cause)) => {
                    return Err(Error::ContentionExhausted { retries, cause });
                },
                Err(EngineError::Failure(cause)) => return Err(Error::Execution(cause)),
            }
        }
    }
}
