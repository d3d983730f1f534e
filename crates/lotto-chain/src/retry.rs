//! Retry helper with exponential backoff for transient RPC failures.

use std::future::Future;
use std::time::Duration;

use crate::error::ChainError;

/// Backoff parameters for [`retry_with_backoff`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retry_attempts: u32,
    /// Delay before the first retry.
    pub initial_retry_delay: Duration,
    /// Delay is never allowed to exceed this.
    pub max_retry_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: 5,
            initial_retry_delay: Duration::from_millis(250),
            max_retry_delay: Duration::from_secs(10),
            backoff_factor: 2,
        }
    }
}

/// delay = `base_delay` x (`backoff_factor` ^ `attempt`), capped at `max_delay`.
fn calculate_backoff_delay(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: u32,
) -> Duration {
    let delay = base_delay
        .checked_mul(backoff_factor.saturating_pow(attempt))
        .unwrap_or(max_delay);
    delay.min(max_delay)
}

/// Retry an async RPC call with exponential backoff, as long as the error is
/// [`ChainError::is_retryable`].
#[allow(
    clippy::arithmetic_side_effects,
    reason = "attempt is bounded by max_retry_attempts, far from u32::MAX"
)]
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt < policy.max_retry_attempts && error.is_retryable() {
                    let delay = calculate_backoff_delay(
                        attempt,
                        policy.initial_retry_delay,
                        policy.max_retry_delay,
                        policy.backoff_factor,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                } else {
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retry_attempts: 3,
            initial_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(10),
            backoff_factor: 2,
        }
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_secs(10);
        for i in 0..4u32 {
            let expected = initial.saturating_mul(2u32.saturating_pow(i));
            assert_eq!(calculate_backoff_delay(i, initial, max, 2), expected);
        }
        assert_eq!(calculate_backoff_delay(10, initial, max, 2), max);
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let policy = test_policy();
        let mut calls = 0_u32;
        let result: Result<u32, ChainError> = retry_with_backoff(&policy, || {
            calls += 1;
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.expect("ok"), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = test_policy();
        let mut calls = 0_u32;
        let result: Result<u32, ChainError> = retry_with_backoff(&policy, || {
            calls += 1;
            async { Err(ChainError::Transport("down".to_owned())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let policy = test_policy();
        let mut calls = 0_u32;
        let result: Result<u32, ChainError> = retry_with_backoff(&policy, || {
            calls += 1;
            async { Err(ChainError::TxRejected("insufficient funds".to_owned())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn succeeds_on_last_retry() {
        let policy = test_policy();
        let mut calls = 0_u32;
        let result: Result<u32, ChainError> = retry_with_backoff(&policy, || {
            let count = calls;
            calls += 1;
            async move {
                if count < 3 {
                    Err(ChainError::Transport("down".to_owned()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.expect("ok"), 42);
        assert_eq!(calls, 4);
    }
}
