//! Polling helper for asserting on asynchronous state.

use std::future::Future;
use std::time::Duration;

/// Poll `check` every 10ms until it returns true or `timeout_ms` elapses.
/// Returns whether the condition was met.
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
