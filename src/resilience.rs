//! Timeout and retry wrapper for outbound gateway calls.
//!
//! Every call the session makes goes through [`ResilientInvoker`]. Each attempt
//! is raced against `per_attempt_timeout_ms`; failed attempts are retried with
//! exponential backoff until `max_attempts` is reached, and the last error is
//! surfaced to the caller.

use crate::config::defaults;
use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use ts_rs::TS;

/// Immutable retry configuration; passed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RetryPolicy {
    #[serde(default = "defaults::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "defaults::default_per_attempt_timeout_ms")]
    #[ts(type = "number")]
    pub per_attempt_timeout_ms: u64,
    #[serde(default = "defaults::default_backoff_base_ms")]
    #[ts(type = "number")]
    pub backoff_base_ms: u64,
    #[serde(default = "defaults::default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: defaults::default_max_attempts(),
            per_attempt_timeout_ms: defaults::default_per_attempt_timeout_ms(),
            backoff_base_ms: defaults::default_backoff_base_ms(),
            backoff_multiplier: defaults::default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Keep values usable regardless of where they came from.
    pub fn sanitized(self) -> Self {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            per_attempt_timeout_ms: self.per_attempt_timeout_ms.max(1),
            backoff_base_ms: self.backoff_base_ms,
            backoff_multiplier: self.backoff_multiplier.max(1),
        }
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    /// Delay after the given failed attempt (1-based):
    /// `backoff_base_ms * backoff_multiplier^(attempt - 1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.backoff_multiplier).saturating_pow(exponent);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: policy.sanitized(),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn invoke<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        invoke_with(self.policy, operation, call).await
    }
}

/// Run `call` under `policy`. A timed-out attempt is dropped, which cancels
/// the underlying future instead of leaving it running.
pub async fn invoke_with<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let policy = policy.sanitized();
    let timeout = policy.per_attempt_timeout();
    let mut attempt = 1;
    loop {
        let err = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(err)) => ReaderError::remote(operation, &err),
            Err(_) => ReaderError::Timeout {
                operation,
                after: timeout,
            },
        };

        if attempt >= policy.max_attempts {
            warn!(
                operation,
                attempts = attempt,
                error = %err,
                "Remote call failed; retries exhausted"
            );
            return Err(err);
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            operation,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Remote call failed; backing off before retry"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(600));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(1200));
    }

    #[test]
    fn sanitized_policy_always_allows_one_attempt() {
        let policy = RetryPolicy {
            max_attempts: 0,
            per_attempt_timeout_ms: 0,
            backoff_base_ms: 10,
            backoff_multiplier: 0,
        }
        .sanitized();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.per_attempt_timeout_ms, 1);
        assert_eq!(policy.backoff_multiplier, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_with_backoff() {
        let invoker = ResilientInvoker::default();
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let result = invoker
            .invoke("get_chapter", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(anyhow!("flaky {n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        // 300ms before the first retry, 600ms before the second.
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_call_surfaces_last_error() {
        let invoker = ResilientInvoker::default();
        let calls = Cell::new(0u32);

        let result: Result<()> = invoker
            .invoke("reading_download", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(anyhow!("refused {n}")) }
            })
            .await;

        assert_eq!(calls.get(), 3);
        assert_eq!(
            result,
            Err(ReaderError::Remote {
                operation: "reading_download",
                message: "refused 3".to_string(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out() {
        let invoker = ResilientInvoker::new(RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        });
        let calls = Cell::new(0u32);

        let result: Result<()> = invoker
            .invoke("check_download", || {
                calls.set(calls.get() + 1);
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.get(), 2);
        assert_eq!(
            result,
            Err(ReaderError::Timeout {
                operation: "check_download",
                after: Duration::from_millis(12_000),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_policy_overrides_invoker_default() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base_ms: 1,
            ..RetryPolicy::default()
        };

        let result: Result<()> = invoke_with(policy, "multiple_download", || {
            calls.set(calls.get() + 1);
            async { Err(anyhow!("")) }
        })
        .await;

        assert_eq!(calls.get(), 5);
        assert_eq!(
            result.map_err(|err| err.to_string()),
            Err("multiple_download failed: unknown error".to_string())
        );
    }
}
