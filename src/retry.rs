use std::future::Future;
use std::iter;
use std::time::Duration;

use crate::Result;

/// Bounded exponential backoff for rate-limited requests.
///
/// A request is attempted at most `max_retries + 1` times, the delay
/// before each retry starts at `initial_backoff` and doubles every time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delays slept before the 2nd, 3rd, ... attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        iter::successors(Some(self.initial_backoff), |delay| {
            delay.checked_mul(2)
        })
        .take(self.max_retries as usize)
    }
}

/// Run `operation` until it succeeds, fails with something other than a
/// rate limit, or the policy runs out of retries.
pub async fn retry_rate_limited<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delays = policy.delays();
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() => match delays.next() {
                Some(delay) => {
                    log::info!("Retrying request in {}ms...", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    log::warn!("still rate limited after {} attempts", attempt);
                    return Err(err);
                }
            },
            Err(err) => return Err(err),
        }
    }
}
