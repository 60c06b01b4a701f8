//! Bounded optimistic-concurrency retry.
//!
//! Mutations read, compute and write back under a revision guard. When the
//! guard fails the whole cycle runs again after a jittered pause, so racing
//! writers spread out instead of colliding on every attempt. The loop is
//! bounded by [`CasRetryConfig`] and the caller's deadline.

use std::{future::Future, time::Duration};

use fail::fail_point;
use rand::Rng;

use crate::{
    config::CasRetryConfig,
    error::{StoreError, StoreResult},
};

/// Re-runs `operation` while it fails with [`StoreError::Conflict`].
///
/// Non-conflict errors are returned immediately. When every attempt
/// conflicts the result is [`StoreError::CasRetriesExhausted`].
#[tracing::instrument(skip(config, operation), fields(max_retries = config.max_retries))]
pub(crate) async fn with_cas_retry<F, Fut, T>(
    config: &CasRetryConfig,
    key: &str,
    mut operation: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = config.max_retries.saturating_add(1);
    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempt = attempt + 1, "write succeeded after conflict");
                }
                return Ok(value);
            },
            Err(StoreError::Conflict { .. }) if attempt + 1 < attempts => {
                let delay = jittered(config.base_delay);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "revision conflict, retrying after jitter",
                );
                fail_point!("cas-retry-before-sleep", |_| {
                    Err(StoreError::internal("injected failure before retry sleep"))
                });
                tokio::time::sleep(delay).await;
            },
            Err(StoreError::Conflict { .. }) => break,
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(attempts, "giving up after repeated conflicts");
    Err(StoreError::CasRetriesExhausted { key: key.to_owned(), attempts })
}

/// `base` plus a random extra of up to `base`.
fn jittered(base: Duration) -> Duration {
    let range = base.as_millis() as u64;
    if range == 0 {
        return base;
    }
    base + Duration::from_millis(rand::rng().random_range(0..=range))
}

/// Bounds `operation` by `timeout`. Dropping the future on expiry cancels
/// whatever step it was in.
pub(crate) async fn with_deadline<Fut, T>(timeout: Duration, operation: Fut) -> StoreResult<T>
where
    Fut: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .unwrap_or(Err(StoreError::Timeout { after: Some(timeout) }))
}
