use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry with linearly increasing backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retrying after `failed_attempts` failures.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        self.base_delay.saturating_mul(failed_attempts)
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// On exhaustion the last error is returned along with the number of
    /// attempts made.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, (E, u32)>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => return Err((e, attempt)),
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!("Attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
