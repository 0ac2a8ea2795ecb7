//! Per-call deadlines for store operations.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Runs `future` under `limit`.
///
/// # Errors
///
/// Returns [`AppError::Timeout`] naming `operation` when the deadline passes,
/// otherwise whatever the future returned.
pub async fn with_deadline<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Store call timed out"
            );
            Err(AppError::Timeout { operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: Result<i32, AppError> = with_deadline(Duration::from_secs(1), "slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::Timeout { operation: "slow" })
        ));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let ok = with_deadline(Duration::from_secs(1), "fast", async { Ok(5) }).await;
        assert_eq!(ok.unwrap(), 5);

        let err: Result<(), AppError> = with_deadline(Duration::from_secs(1), "fast", async {
            Err(AppError::NotFound {
                code: "abcd".to_string(),
            })
        })
        .await;
        assert!(matches!(err, Err(AppError::NotFound { .. })));
    }
}
