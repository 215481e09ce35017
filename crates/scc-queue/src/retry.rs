//! Generic bounded retry helper, shared by filesystem and HTTP clients.
//! Jitter is computed by [`crate::backoff::BackoffPolicy`] rather than a
//! time-based pseudo-random fallback.

use std::future::Future;

use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub operation_name: String,
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: BackoffPolicy::default(),
            operation_name: operation_name.into(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Run `operation` up to `config.max_retries + 1` times total, sleeping with
/// full-jitter backoff between attempts. Returns the last error if every
/// attempt fails.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= config.max_retries => {
                let delay = config.backoff.delay_for_attempt(attempt);
                debug!(
                    operation = %config.operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after failure: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(operation = %config.operation_name, attempt, "giving up after exhausting retries: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn succeeds_immediately_without_sleeping() {
        let config = RetryConfig::new("test", 3).with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)));
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_bound() {
        let config = RetryConfig::new("test", 3).with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)));
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("transient") } else { Ok(7) } }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let config = RetryConfig::new("test", 2).with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)));
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_async(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent") }
        })
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
