//! Call-site retry policy for model calls.
//!
//! The adapters never retry on their own. Callers wrap a call in
//! [`with_retry`] with whatever [`RetryPolicy`] suits them: the first turn of
//! a reply uses the configured backoff, continuations use [`RetryPolicy::none`].

use pal_domain::error::Result;
use pal_domain::trace::TraceEvent;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Sleep before the second attempt; doubled for each attempt after.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sleep before `attempt` (1-based). Zero for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max && e.is_retryable() => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                tracing::warn!(
                    provider = label,
                    attempt,
                    max_attempts = max,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "model call failed, retrying"
                );
                TraceEvent::LlmRetry {
                    provider: label.to_owned(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: e.to_string(),
                }
                .emit();
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_domain::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn empty() -> Error {
        Error::EmptyResponse {
            provider: "fake".into(),
        }
    }

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_before(1), Duration::ZERO);
        assert_eq!(p.delay_before(2), Duration::from_secs(1));
        assert_eq!(p.delay_before(3), Duration::from_secs(2));
        assert_eq!(p.delay_before(5), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let out = with_retry(&RetryPolicy::default(), "fake", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(empty())
            } else {
                Ok("hi")
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "hi");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&RetryPolicy::default(), "fake", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(empty())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::EmptyResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&RetryPolicy::default(), "fake", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::Config("no key".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn none_policy_is_single_shot() {
        let calls = AtomicU32::new(0);
        let _ = with_retry(&RetryPolicy::none(), "fake", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(empty())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
