//! Bounded retry with exponential backoff for LLM calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use somnia_core::config::LlmConfig;

use crate::llm::LlmError;

/// Attempt limits, per-attempt timeout, and backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent.
    ///
    /// Each attempt is bounded by `attempt_timeout`; an elapsed deadline
    /// counts as a retryable `LlmError::Timeout`. `operation` receives the
    /// 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.attempt_timeout, operation(attempt)).await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.attempt_timeout)),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(RetryError {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.delay_after(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "LLM attempt failed, retrying"
            );
            sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// All attempts failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("LLM call failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError {
    pub attempts: u32,
    pub last_error: LlmError,
}

/// Waits between attempts. Swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
