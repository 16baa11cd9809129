use std::future::Future;
use std::time::Duration;

use drive_core::DriveError;
use rand::Rng;

/// Attempts per listing call before the error surfaces to the caller's scope.
pub const LIST_ATTEMPTS: u32 = 3;

const BASE_DELAY_MS: u64 = 250;
const MAX_DELAY_MS: u64 = 10_000;

/// Retries a Drive API call for rate-limit and transient failures, with
/// jittered exponential backoff between attempts. Auth and permanent errors
/// surface immediately.
pub async fn with_retry<T, F, Fut>(mut call: F) -> Result<T, DriveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DriveError>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < LIST_ATTEMPTS => {
                tokio::time::sleep(retry_delay(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(MAX_DELAY_MS);
    Duration::from_millis(rand::thread_rng().gen_range(0..=exp))
}
