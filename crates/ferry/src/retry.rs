//! Retry executor shared by every provider call.
//!
//! Errors are classified by a structured tag, then by an embedded HTTP status,
//! and finally by textual indicators when neither is available.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};

use crate::entity::Platform;

/// HTTP statuses retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Error tags retried by default.
pub const DEFAULT_RETRYABLE_TAGS: &[&str] = &["rate_limited", "network", "timeout", "server_error"];

/// Lowercase substrings that mark an unstructured error as transient.
const TRANSIENT_INDICATORS: &[&str] = &[
    "rate limit",
    "ratelimited",
    "too many requests",
    "timeout",
    "timed out",
    "temporary failure",
    "connection reset",
    "econnreset",
    "socket hang up",
];

/// Structured hints an error can expose to the retry classifier.
pub trait RetryClassify: Display {
    /// Error-type tag such as `rate_limited` or `network`.
    fn error_tag(&self) -> Option<&'static str> {
        None
    }

    /// HTTP status the error was derived from, if any.
    fn http_status(&self) -> Option<u16> {
        None
    }
}

/// Retry policy for one class of outbound calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f32,
    pub retryable_statuses: Vec<u16>,
    pub retryable_tags: Vec<&'static str>,
    pub with_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            retryable_tags: DEFAULT_RETRYABLE_TAGS.to_vec(),
            with_jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom bounds and default classification sets.
    #[must_use]
    pub fn new(max_attempts: usize, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Policy tuned for one platform's rate-limit contract.
    ///
    /// - Slack: tier limits reset per minute, so the defaults apply.
    /// - Linear: complexity budgets refill slowly; fewer, longer waits.
    /// - Todoist: short windows; cap waits at 30 seconds.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Slack => Self::default(),
            Platform::Linear => Self::new(4, Duration::from_secs(2), Duration::from_secs(60)),
            Platform::Todoist => Self::new(5, Duration::from_secs(1), Duration::from_secs(30)),
        }
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.retryable_statuses = statuses.into();
        self
    }

    #[must_use]
    pub fn with_retryable_tags(mut self, tags: impl Into<Vec<&'static str>>) -> Self {
        self.retryable_tags = tags.into();
        self
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this policy.
    ///
    /// `max_attempts` counts the first call, so the builder allows one fewer retry.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.multiplier)
            .with_max_times(self.max_attempts.saturating_sub(1));

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }

    /// The delays a fresh run of this policy would sleep between attempts.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }

    /// Classify an error as retryable.
    ///
    /// A matching tag wins; otherwise an embedded status decides alone;
    /// only errors without structure fall back to message inspection.
    #[must_use]
    pub fn is_retryable<E: RetryClassify + ?Sized>(&self, error: &E) -> bool {
        if let Some(tag) = error.error_tag()
            && self.retryable_tags.contains(&tag)
        {
            return true;
        }

        if let Some(status) = error.http_status() {
            return self.retryable_statuses.contains(&status);
        }

        let message = error.to_string().to_lowercase();
        TRANSIENT_INDICATORS.iter().any(|needle| message.contains(needle))
    }
}

/// One retry about to happen.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// What is being retried (endpoint or operation name).
    pub label: String,
    /// The attempt that just failed, starting at 1.
    pub attempt: u32,
    /// Sleep before the next attempt.
    pub delay: Duration,
    /// Short description of the failure.
    pub error: String,
}

/// Callback invoked once per retry.
pub type RetryObserver = Box<dyn Fn(&RetryAttempt) + Send + Sync>;

/// Execute an operation, retrying failures the policy classifies as retryable.
///
/// - Tracks attempts with an atomic counter
/// - Reports each retry to `observer` and at debug level
/// - Propagates non-retryable errors immediately and the last error once
///   attempts are exhausted
///
/// Cancellation is the operation's concern: check it inside `operation`.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    label: &str,
    observer: Option<&RetryObserver>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClassify,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(policy.backoff())
        .when(|e: &E| policy.is_retryable(e))
        .notify(|err: &E, dur: Duration| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            let message = err.to_string();
            let short = message.lines().next().unwrap_or_default().to_string();
            tracing::debug!(
                label,
                attempt = current_attempt,
                delay_ms = dur.as_millis() as u64,
                "Retrying after error: {}",
                short
            );
            if let Some(cb) = observer {
                cb(&RetryAttempt {
                    label: label.to_string(),
                    attempt: current_attempt,
                    delay: dur,
                    error: short,
                });
            }
        })
        .await
}
