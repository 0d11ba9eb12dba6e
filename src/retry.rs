//! Exponential backoff for transient Graph and token endpoint failures.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration for outbound HTTP calls.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 means a single attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled after each attempt.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay, including Retry-After.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), capped at `max_backoff_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    fn cap(&self, delay: Duration) -> Duration {
        delay.min(Duration::from_millis(self.max_backoff_ms))
    }
}

/// Outcome of one attempt, with an optional server-requested delay.
pub struct Attempt<T> {
    pub result: Result<T, SyncError>,
    pub retry_after: Option<Duration>,
}

impl<T> From<Result<T, SyncError>> for Attempt<T> {
    fn from(result: Result<T, SyncError>) -> Self {
        Self {
            result,
            retry_after: None,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// Only errors for which [`SyncError::is_transient`] holds are retried. When
/// an attempt carries a `retry_after` hint it replaces the computed backoff,
/// still capped at `max_backoff_ms`.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut retries = 0;

    loop {
        let attempt = operation().await;
        let error = match attempt.result {
            Ok(value) => {
                if retries > 0 {
                    debug!(operation = what, retries, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_transient() {
            return Err(error);
        }

        if retries >= policy.max_retries {
            debug!(
                operation = what,
                max_retries = policy.max_retries,
                "Retries exhausted"
            );
            return Err(error);
        }

        retries += 1;
        let delay = match attempt.retry_after {
            Some(hint) => policy.cap(hint),
            None => policy.backoff(retries),
        };

        warn!(
            operation = what,
            attempt = retries,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );

        tokio::time::sleep(delay).await;
    }
}

/// Parse a Retry-After header given in seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
