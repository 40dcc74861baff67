//! Retrying writes that lost a race.

use std::future::Future;
use std::time::Duration;

use rapport_common::AppResult;
use tracing::warn;

const BASE_BACKOFF_MS: u64 = 10;

/// Run `op`, re-running it while it fails with a retryable error.
///
/// Only [`rapport_common::AppError::Conflict`] is retried: such a failure
/// means the transaction rolled back, so running it again cannot apply it
/// twice. After `retries` extra attempts the last error is returned.
pub async fn retry_on_conflict<T, F, Fut>(retries: u32, operation: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(operation, attempt, error = %err, "Retrying after write conflict");
                tokio::time::sleep(Duration::from_millis(BASE_BACKOFF_MS << attempt.min(6))).await;
            }
            result => return result,
        }
    }
}
