//! Bounded retry for contention and transient store failures

use crate::config::RetryPolicy;
use crate::error::Result;
use rand::Rng;
use std::time::Duration;

/// Run `attempt` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent
///
/// Each attempt must be a complete unit of work; a failed attempt has already
/// rolled back by the time it returns.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut n = 1;
    loop {
        match attempt() {
            Err(e) if e.is_retryable() && n < policy.max_attempts => {
                let backoff = jittered(policy.backoff(n));
                log::warn!(
                    "{operation} failed (attempt {n}/{}): {e}; retrying in {backoff:?}",
                    policy.max_attempts
                );
                std::thread::sleep(backoff);
                n += 1;
            }
            result => return result,
        }
    }
}

/// Add up to 50% random jitter
fn jittered(base: Duration) -> Duration {
    let ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 {
        return base;
    }
    let extra = rand::rng().random_range(0..=ms / 2);
    Duration::from_millis(ms.saturating_add(extra))
}
