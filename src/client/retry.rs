//! Retry with exponential backoff for search requests.
//!
//! Only the HTTP backend retries; the worker pool treats whatever error the
//! client finally returns as final for the task.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::{DownloadError, DownloadErrorKind};

/// Default maximum attempts per search request (initial attempt included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Upper bound on random jitter added to each delay.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// The upcoming attempt number (1-indexed).
        attempt: u32,
    },
    /// Give up and return the error.
    DoNotRetry {
        /// Why retrying was ruled out.
        reason: String,
    },
}

/// Exponential backoff policy: `min(base * multiplier^(attempt-1), max) + jitter`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit settings. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom attempt count and default delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether the failed `attempt` (1-indexed) should be retried.
    ///
    /// Network, rate-limit, and timeout failures are transient; quota and
    /// other failures are not. A server-provided `Retry-After` replaces the
    /// computed backoff.
    #[instrument(level = "debug", skip(self, error), fields(kind = %error.kind()))]
    pub fn should_retry(&self, error: &DownloadError, attempt: u32) -> RetryDecision {
        match error.kind() {
            DownloadErrorKind::Quota | DownloadErrorKind::Other => {
                return RetryDecision::DoNotRetry {
                    reason: format!("{} failure - retry would not help", error.kind()),
                };
            }
            DownloadErrorKind::Network
            | DownloadErrorKind::RateLimit
            | DownloadErrorKind::Timeout => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match error {
            DownloadError::RateLimit {
                retry_after: Some(wait),
                ..
            } => (*wait).min(self.max_delay),
            _ => self.calculate_delay(attempt),
        };

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn jitter() -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}
