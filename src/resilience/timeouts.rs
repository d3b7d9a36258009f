//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap chain operations with a hard deadline
//! - Surface expiry as a distinct, classifiable error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out future is dropped; the underlying network request may
//!   still complete on the remote side

use std::future::Future;
use std::time::Duration;

use crate::chain::types::{ChainError, ChainResult};

/// Race `fut` against `duration`.
pub async fn with_timeout<T, F>(
    duration: Duration,
    operation_name: &str,
    fut: F,
) -> ChainResult<T>
where
    F: Future<Output = ChainResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation = operation_name,
                timeout_ms = duration.as_millis() as u64,
                "Operation timed out"
            );
            Err(ChainError::Timeout {
                operation: operation_name.to_string(),
                timeout_ms: duration.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_timeout(Duration::from_millis(100), "fast", async {
            Ok::<_, ChainError>(5)
        })
        .await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: ChainResult<u32> = with_timeout(Duration::from_millis(20), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(5)
        })
        .await;

        match result {
            Err(ChainError::Timeout { operation, timeout_ms }) => {
                assert_eq!(operation, "slow");
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("expected timeout, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: ChainResult<u32> = with_timeout(Duration::from_millis(100), "op", async {
            Err(ChainError::Rpc("boom".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }
}
