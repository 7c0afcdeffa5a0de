//! Retry policy absorbing transient rate-limit rejections from remote APIs.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::models::RetryConfig;

/// Retry policy with exponential backoff
///
/// Retries an operation while its error is classified as transient by the
/// caller-supplied predicate. Before attempt `n + 1` the policy sleeps
/// `2 * 2^n` time units (no jitter): with the default one second unit,
/// 2s → 4s → 8s → 16s.
///
/// # Retry Decision
/// - Retry on: errors for which the predicate returns true, while attempts remain
/// - Do NOT retry: any other error, returned immediately
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    max_attempts: u32,
    /// Backoff time unit
    time_unit: Duration,
    /// Stops retrying when cancelled
    cancellation: Option<CancellationToken>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a retry policy
    ///
    /// # Arguments
    /// * `max_attempts` - Total attempts, clamped to at least 1
    /// * `time_unit` - Backoff unit (delay before retry `n` is `2 * 2^n` units)
    ///
    /// # Example
    /// ```
    /// use driftscan::infrastructure::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(5, Duration::from_secs(1));
    /// assert_eq!(policy.max_attempts(), 5);
    /// ```
    pub fn new(max_attempts: u32, time_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            time_unit,
            cancellation: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.time_unit())
    }

    /// Stop retrying once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }

    /// Execute an async operation with retry logic
    ///
    /// # Arguments
    /// * `is_transient` - Classifies errors worth retrying
    /// * `operation` - Async function producing the call's result
    ///
    /// # Returns
    /// * `Ok(T)` - Operation succeeded
    /// * `Err(E)` - First non-transient error, or the last transient error
    ///   once attempts are exhausted or the policy is cancelled
    pub async fn execute<T, E, F, Fut, P>(&self, is_transient: P, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "Operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !is_transient(&err) {
                debug!(error = %err, "Permanent error, not retrying");
                return Err(err);
            }

            if attempt + 1 >= self.max_attempts {
                warn!(attempts = attempt + 1, error = %err, "Transient error persisted after all attempts");
                return Err(err);
            }

            let backoff = self.calculate_backoff(attempt);
            warn!(
                attempt = attempt + 1,
                max_attempts = self.max_attempts,
                ?backoff,
                error = %err,
                "Transient error, retrying"
            );

            if !self.wait(backoff).await {
                debug!(error = %err, "Retry cancelled");
                return Err(err);
            }

            attempt += 1;
        }
    }

    /// Retry a call whose only output is its error
    ///
    /// Any success value is captured by the closure before it returns.
    pub async fn retry_on_failure<E, F, Fut, P>(&self, is_transient: P, operation: F) -> Result<(), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        self.execute(is_transient, operation).await
    }

    /// Backoff before retrying after failed attempt `attempt` (0-indexed)
    ///
    /// Formula: `time_unit * 2 * 2^attempt`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_mul(2_u32.saturating_pow(attempt));
        self.time_unit.saturating_mul(factor)
    }

    /// Sleep for `backoff`, returning false when cancelled first
    async fn wait(&self, backoff: Duration) -> bool {
        let Some(token) = &self.cancellation else {
            sleep(backoff).await;
            return true;
        };

        if token.is_cancelled() {
            return false;
        }

        tokio::select! {
            () = token.cancelled() => false,
            () = sleep(backoff) => true,
        }
    }
}
