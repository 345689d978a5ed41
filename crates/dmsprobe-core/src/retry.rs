//! Bounded retry with a constant delay.
//!
//! The operation must be idempotent: it is invoked again after every failure
//! with no way for the executor to undo partial effects.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use crate::settings::RetryPolicy;

/// Invoke `op` until it succeeds or the budget is spent.
///
/// Returns the first success, or the error from the final attempt exactly
/// as the operation produced it.
pub async fn retry<T, E, F, Fut>(op: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(op, policy, |_| true).await
}

/// Like [`retry`], but gives up at the first error `is_transient` rejects
/// and returns that error unchanged.
pub async fn retry_if<T, E, F, Fut, P>(
    mut op: F,
    policy: RetryPolicy,
    mut is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: FnMut(&E) -> bool,
{
    let total = policy.total_attempts();
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !is_transient(&e) => {
                debug!(attempt, error = %e, "operation failed with a non-retryable error");
                return Err(e);
            }
            Err(e) if attempt >= total => {
                warn!(attempts = attempt, error = %e, "retry budget exhausted");
                return Err(e);
            }
            Err(e) => {
                debug!(
                    attempt,
                    max_attempts = total,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "operation failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
