//! Bounded retry for idempotent reads.
//!
//! Only `CoreError::Unavailable` is retried. Writes, and in particular the
//! order commit, must never go through here.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::CoreResult;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    /// Number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each further attempt
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Transient storage error on attempt {}/{}: {}; retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
