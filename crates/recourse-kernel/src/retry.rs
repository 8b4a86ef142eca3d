//! Bounded retry with exponential backoff and jitter.
//!
//! Wraps an arbitrary asynchronous external call: on a retryable failure
//! the executor waits, doubles the delay up to a cap, scales it by a
//! pseudo-random jitter factor in `[0.8, 1.2)` so concurrent retries do
//! not synchronize, and tries again. After the attempt budget is spent
//! the last failure surfaces as [`EngineError::TransientExhausted`].
//!
//! Waits race the run's cancellation token — cancellation during a
//! backoff delay aborts immediately instead of waiting out the sleep.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// Retry budget and delay bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay (before jitter)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Delay before the retry following failed attempt `attempt` (0-indexed).
    ///
    /// `min(initial * 2^attempt, max)` scaled by a jitter factor uniform
    /// in `[0.8, 1.2)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.initial_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        let capped_ms = base_ms.min(self.max_delay.as_millis() as u64);
        let jitter: f64 = {
            use rand::Rng;
            rand::thread_rng().gen_range(0.8..1.2)
        };
        Duration::from_millis((capped_ms as f64 * jitter) as u64)
    }
}

/// Retry executor for outbound calls.
///
/// The operation is a zero-argument asynchronous call; the executor's
/// only side effects are timed waits. Non-retryable failures (not-found,
/// configuration, cancellation) surface immediately regardless of the
/// remaining budget.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The configured policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, retrying transient failures.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "external call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempt + 1 == max_attempts {
                        return Err(EngineError::TransientExhausted {
                            attempts: max_attempts,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.policy.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        Err(EngineError::TransientExhausted {
            attempts: max_attempts,
            last: "retry loop completed without result".to_string(),
        })
    }
}
