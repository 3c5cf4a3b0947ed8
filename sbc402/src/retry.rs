//! Bounded retry with exponential back-off.
//!
//! Every outbound call the engine makes (the original and paid requests, the
//! facilitator's `/verify` and `/settle`) runs through [`with_retry`]. Whether
//! an error is worth retrying is decided by matching a configurable set of
//! tokens against the error's [`RetryableError::retry_message`] and its
//! [`RetryableError::kind`]. Semantic failures such as an invalid signature
//! are returned as values, not errors, and so are never retried.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

/// Errors that expose a short kind name for retry classification.
pub trait RetryableError: std::error::Error {
    /// Stable kind name, e.g. `"PaymentTimeout"` or `"Transport"`.
    fn kind(&self) -> &str;

    /// Text the retry tokens are matched against.
    ///
    /// Defaults to the display message. Errors that embed remote content,
    /// such as a response body, should return only their own summary so that
    /// digits in that content cannot look like a retryable status.
    fn retry_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

/// Tokens retried by default: transport faults, timeouts and the HTTP
/// statuses of overloaded or restarting upstreams.
pub const DEFAULT_RETRYABLE: &[&str] = &[
    "Transport",
    "PaymentTimeout",
    "ECONNRESET",
    "ETIMEDOUT",
    "ECONNREFUSED",
    "429",
    "502",
    "503",
    "504",
];

/// Retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Case-sensitive substrings that mark an error as retryable.
    pub retryable: Vec<String>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retryable: DEFAULT_RETRYABLE.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl RetryOptions {
    /// Sets the attempt budget. Values below one are treated as one.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the first delay and the delay cap.
    #[must_use]
    pub const fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Sets the back-off multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Replaces the retryable token set.
    #[must_use]
    pub fn with_retryable<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Delay awaited after zero-based attempt `n` fails:
    /// `min(initial_delay * backoff_multiplier^n, max_delay)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn backoff_delay(&self, n: u32) -> Duration {
        let exponent = i32::try_from(n).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let cap = self.max_delay.as_nanos() as f64;
        if !nanos.is_finite() || nanos >= cap {
            self.max_delay
        } else {
            Duration::from_nanos(nanos.max(0.0) as u64)
        }
    }

    /// Whether `error` matches any retryable token.
    pub fn is_retryable<E: RetryableError + ?Sized>(&self, error: &E) -> bool {
        let message = error.retry_message();
        let kind = error.kind();
        self.retryable
            .iter()
            .any(|token| message.contains(token.as_str()) || kind.contains(token.as_str()))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error or
/// exhausts `options.max_attempts`.
///
/// No delay follows the final attempt. `label` names the operation in logs.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the attempt
/// budget is spent.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    label: &str,
    options: &RetryOptions,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let attempts = options.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let last = attempt + 1 >= attempts;
                if last || !options.is_retryable(&err) {
                    #[cfg(feature = "telemetry")]
                    tracing::debug!(label, attempt = attempt + 1, kind = err.kind(), "giving up");
                    return Err(err);
                }
                let delay = options.backoff_delay(attempt);
                #[cfg(feature = "telemetry")]
                tracing::warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "retrying"
                );
                #[cfg(not(feature = "telemetry"))]
                let _ = label;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
