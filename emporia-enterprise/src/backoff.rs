use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use crate::error::EnterpriseError;

/// Bounded exponential backoff around a fallible remote call.
#[derive(Debug)]
pub struct Backoff {
    max_tries: u32,
    base: Duration,
    invocations: AtomicU64,
}

impl Backoff {
    pub fn new(max_tries: u32, base: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            base,
            invocations: AtomicU64::new(0),
        }
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// How many calls went through [`Backoff::retry`].
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// `base * 2^(retry - 1)`, capped at eight doublings.
    pub fn delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8);
        self.base.saturating_mul(1u32 << shift)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// `max_tries` attempts are used up; the last error is returned.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, EnterpriseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EnterpriseError>>,
    {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_tries => {
                    let delay = self.delay(attempt);
                    debug!(attempt, ?delay, "Retrying enterprise call: {}", err);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(attempts = attempt, "Giving up on enterprise call: {}", err);
                    }
                    return Err(err);
                }
            }
        }
    }
}
