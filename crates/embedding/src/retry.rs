//! Retry logic with exponential backoff for remote embedding calls.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::EmbeddingError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try.
    pub max_retries: u32,
    /// Initial delay (base for exponential backoff) in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Add random jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Delay before a given retry attempt (1-indexed; attempt 0 is the first
    /// try and never waits).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let mut delay_ms = exponential.min(self.max_delay_ms as f64) as u64;

        // +/- 25% jitter keeps synchronized clients from retrying in lockstep.
        if self.jitter {
            let jitter_range = delay_ms / 4;
            if jitter_range > 0 {
                let offset = fastrand::u64(0..jitter_range * 2);
                delay_ms = delay_ms.saturating_sub(jitter_range) + offset;
            }
        }

        Duration::from_millis(delay_ms)
    }
}

/// Run an async operation with bounded retries. Only retriable errors
/// (upstream failures) trigger another attempt; everything else returns
/// immediately.
pub(crate) async fn execute_with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, EmbeddingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EmbeddingError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let delay = config.calculate_delay(attempt);
        if delay > Duration::ZERO {
            sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() => {
                tracing::debug!(attempt, error = %err, "retriable embedding failure");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error
        .unwrap_or_else(|| EmbeddingError::UpstreamUnavailable("all retries exhausted".into())))
}
