//! Retry policy for transient backend failures
//!
//! Remote backend operations may fail transiently (timeout, connection
//! reset). Every such operation is wrapped in [`with_retry`], which retries
//! with capped, jittered exponential backoff. Exhausting the budget turns
//! the failure into [`Error::RetriesExhausted`], which is fatal for the
//! enclosing import run. Non-transient errors are returned unchanged on the
//! first attempt.

use rand::Rng;
use rankstore_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), jittered to spread
    /// reconnect storms
    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = (attempt - 1).min(16);
        let exp = self.base_delay_ms.saturating_mul(1u64 << shift);
        let capped = exp.min(self.max_delay_ms);
        let jittered = rand::thread_rng().gen_range(capped / 2..=capped.max(1));
        Duration::from_millis(jittered)
    }
}

/// Run `operation` until it succeeds, fails non-transiently, or exhausts
/// the retry budget
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut run: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient backend failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_transient() => {
                return Err(Error::RetriesExhausted {
                    attempts: attempt + 1,
                    last: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
