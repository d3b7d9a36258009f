//! Retry logic for chain operations.
//!
//! # Responsibilities
//! - Execute retries with exponential backoff + jitter
//! - Classify failures: user cancellation is terminal, rate limits use
//!   their own (slower) schedule, expired blockhashes retry immediately
//! - Enforce the attempt ceiling, then surface the last error
//!
//! # Design Decisions
//! - Cancellation never consumes retry attempts; it is not a failure
//! - Terminal errors (insufficient funds, wallet problems) short-circuit
//! - Jittered backoff prevents thundering herd against public endpoints

use std::future::Future;

use tokio::time::sleep;

use crate::chain::types::{ChainError, ChainResult};
use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Errors that end a retry loop immediately.
fn is_terminal(error: &ChainError) -> bool {
    matches!(
        error,
        ChainError::Cancelled
            | ChainError::InvalidAmount(_)
            | ChainError::InsufficientFunds { .. }
            | ChainError::Wallet(_)
            | ChainError::Signing(_)
            | ChainError::AccountCreation(_)
            | ChainError::Confirmation(_)
            | ChainError::Exhausted { .. }
    )
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Returns the first success, the first terminal error, or
/// [`ChainError::Exhausted`] once the attempt ceiling is reached.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    operation_name: &str,
    mut op: F,
) -> ChainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        tracing::debug!(operation = operation_name, attempt, max_attempts, "Attempt");

        let error = match op().await {
            Ok(value) => {
                tracing::debug!(operation = operation_name, attempt, "Success");
                return Ok(value);
            }
            Err(e) => e,
        };

        if is_terminal(&error) {
            tracing::debug!(operation = operation_name, error = %error, "Terminal error, not retrying");
            return Err(error);
        }

        if attempt == max_attempts {
            tracing::warn!(operation = operation_name, attempts = max_attempts, "All attempts failed");
            return Err(ChainError::Exhausted {
                attempts: max_attempts,
                last_error: error.to_string(),
            });
        }

        match error {
            ChainError::BlockhashExpired => {
                tracing::debug!(operation = operation_name, "Blockhash expired, retrying immediately");
            }
            ChainError::RateLimited(_) => {
                let delay = calculate_backoff(
                    attempt,
                    policy.rate_limit_base_ms,
                    policy.rate_limit_max_ms,
                    policy.growth_factor,
                );
                tracing::info!(operation = operation_name, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                sleep(delay).await;
            }
            ref e => {
                let delay = calculate_backoff(
                    attempt,
                    policy.base_delay_ms,
                    policy.max_delay_ms,
                    policy.growth_factor,
                );
                tracing::debug!(operation = operation_name, error = %e, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
                sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop returns within the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_policy() -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 50,
            rate_limit_base_ms: 20,
            rate_limit_max_ms: 100,
            growth_factor: 1.5,
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let result = with_retry(&fast_policy(), "op", || async { Ok::<_, ChainError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        // Fails twice with a rate-limit error then succeeds; the success
        // must come back after two backoff delays.
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let start = Instant::now();
        let result = with_retry(&fast_policy(), "op", move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ChainError::RateLimited("429".to_string()))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two rate-limit delays: 20ms + 30ms minimum.
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[tokio::test]
    async fn test_cancellation_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: ChainResult<u32> = with_retry(&fast_policy(), "op", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChainError::Cancelled)
            }
        })
        .await;

        assert!(matches!(result, Err(ChainError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_short_circuits() {
        let result: ChainResult<u32> = with_retry(&fast_policy(), "op", || async {
            Err(ChainError::InsufficientFunds {
                required: 100,
                available: 1,
            })
        })
        .await;
        assert!(matches!(result, Err(ChainError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: ChainResult<u32> = with_retry(&fast_policy(), "op", move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ChainError::Rpc("connection refused".to_string()))
            }
        })
        .await;

        match result {
            Err(ChainError::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected exhaustion, got {:?}", other.err()),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_blockhash_expiry_retries_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let start = Instant::now();
        let result = with_retry(&fast_policy(), "op", move || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(ChainError::BlockhashExpired)
                } else {
                    Ok(1u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        // No backoff applied for expired blockhashes.
        assert!(start.elapsed().as_millis() < 100);
    }
}
