use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Runs `operation` once plus up to `retries` more times, sleeping
/// `delay_ms` between attempts. Returns the last error if all attempts fail.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(attempt, retries, error = %err, "Recommendation request failed, retrying");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
