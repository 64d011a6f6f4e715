use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default time a condition is given to become true.
///
/// Batches are applied within milliseconds, the margin is for slow CI machines.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it returns true.
///
/// # Panics
///
/// Panics when [`DEFAULT_WAIT_TIMEOUT`] elapses first, so a test fails instead of hanging.
pub async fn wait_until<F>(description: &str, condition: F)
where
    F: FnMut() -> bool,
{
    wait_until_with_timeout(description, DEFAULT_WAIT_TIMEOUT, condition).await
}

/// Polls `condition` until it returns true or `timeout` elapses.
pub async fn wait_until_with_timeout<F>(description: &str, timeout: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            panic!("timed out after {timeout:?} waiting until {description}");
        }

        sleep(POLL_INTERVAL).await;
    }
}

/// Polls the async `condition` until it returns true.
pub async fn wait_until_async<F, Fut>(description: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + DEFAULT_WAIT_TIMEOUT;
    while !condition().await {
        if Instant::now() >= deadline {
            panic!("timed out after {DEFAULT_WAIT_TIMEOUT:?} waiting until {description}");
        }

        sleep(POLL_INTERVAL).await;
    }
}
