//! Retry with exponential backoff for store reads.
//!
//! Listing and fetching records is safe to repeat, so transient failures
//! (rate limits, timeouts, 5xx responses, dropped connections) are retried.
//! Writes are never passed through here: a create that timed out may still
//! have landed, and repeating it would duplicate the record.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Backoff policy for store reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial call.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds.
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Backoff ceiling, in milliseconds.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Growth factor between consecutive backoffs.
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Backoff before retry number `attempt` (1-based); zero for the
    /// initial call.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(exponent) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let jitter = if self.add_jitter {
            secs * 0.25 * rand::random::<f64>()
        } else {
            0.0
        };
        Duration::from_secs_f64(secs + jitter)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Whether a failed read may succeed if repeated.
#[must_use]
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::RateLimit(_) | Error::Timeout { .. } | Error::Io(_) => true,
        Error::Http(e) => e.is_timeout() || e.is_connect(),
        Error::SourceStore(msg) | Error::TargetStore(msg) => {
            let msg = msg.to_lowercase();
            let is_transient = msg.contains("timeout")
                || msg.contains("timed out")
                || msg.contains("connection refused")
                || msg.contains("connection reset")
                || msg.contains("request failed");
            let is_server_error = [" 500", " 502", " 503", " 504"]
                .iter()
                .any(|code| msg.contains(code))
                || msg.contains("service unavailable")
                || msg.contains("bad gateway");
            is_transient || is_server_error
        }
        _ => false,
    }
}

/// Runs `operation`, repeating it after a backoff while it fails with a
/// retryable error and attempts remain.
///
/// Returns the first success, the first non-retryable error, or the last
/// error once attempts are exhausted.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{}: recovered after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < config.max_retries && is_retryable_error(&e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{}: {} (retry {}/{} in {:?})",
                    operation_name, e, attempt, config.max_retries, delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
