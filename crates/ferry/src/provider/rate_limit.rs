use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::time::Instant;

use crate::entity::Platform;

use super::types::RateLimitInfo;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default pacing floor per platform (requests per second).
pub mod rate_limits {
    /// Slack: Tier 3 methods allow ~50/min; one per second stays well clear.
    pub const SLACK_DEFAULT_RPS: u32 = 1;
    /// Linear: 1,500 requests/hour per key.
    pub const LINEAR_DEFAULT_RPS: u32 = 2;
    /// Todoist: 450 requests per 15 minutes.
    pub const TODOIST_DEFAULT_RPS: u32 = 2;
}

/// Get the default pacing floor for a platform.
pub fn default_rps_for_platform(platform: Platform) -> u32 {
    match platform {
        Platform::Slack => rate_limits::SLACK_DEFAULT_RPS,
        Platform::Linear => rate_limits::LINEAR_DEFAULT_RPS,
        Platform::Todoist => rate_limits::TODOIST_DEFAULT_RPS,
    }
}

/// Tuning for an [`AdaptiveRateLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    /// First backoff step after a rate limit or server error.
    pub initial_backoff: Duration,
    /// Upper bound for backoff and for any single quota wait.
    pub max_delay: Duration,
    /// Optional steady pacing floor enforced with `governor`.
    pub requests_per_second: Option<u32>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            requests_per_second: None,
        }
    }
}

impl LimiterConfig {
    /// Defaults plus the platform's pacing floor.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            requests_per_second: Some(default_rps_for_platform(platform)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    /// Minimum gap enforced between two requests.
    current_delay: Duration,
    /// Slot reserved by the most recent `wait()`.
    last_request: Option<Instant>,
    /// Quota exhaustion or explicit retry-after.
    blocked_until: Option<Instant>,
    quota: Option<RateLimitInfo>,
}

/// Per-connection adaptive rate limiter.
///
/// Reacts to provider-reported quota and to 429/5xx responses with capped
/// exponential backoff. Clones share state, so one limiter can be handed to
/// every call a provider makes for the same connection.
///
/// # Example
///
/// ```ignore
/// let limiter = AdaptiveRateLimiter::new(LimiterConfig::for_platform(Platform::Slack));
///
/// limiter.wait().await;
/// match client.call().await {
///     Ok(resp) => limiter.record_success(parse_quota(&resp).as_ref()),
///     Err(e) if e.is_rate_limited() => limiter.record_rate_limit(e.retry_after()),
///     Err(_) => limiter.record_server_error(),
/// }
/// ```
#[derive(Clone)]
pub struct AdaptiveRateLimiter {
    config: LimiterConfig,
    state: Arc<Mutex<LimiterState>>,
    pacer: Option<Arc<GovernorRateLimiter>>,
}

impl std::fmt::Debug for AdaptiveRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveRateLimiter")
            .field("config", &self.config)
            .field("current_delay", &self.current_delay())
            .finish()
    }
}

impl AdaptiveRateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let pacer = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Self {
            config,
            state: Arc::new(Mutex::new(LimiterState::default())),
            pacer,
        }
    }

    /// Limiter with the platform's default pacing floor.
    pub fn for_platform(platform: Platform) -> Self {
        Self::new(LimiterConfig::for_platform(platform))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Suspend until it is safe to issue the next request.
    ///
    /// Honors outstanding quota exhaustion first, then the current backoff
    /// gap since the previous request, then the pacing floor.
    pub async fn wait(&self) {
        let slot = {
            let mut state = self.lock();
            let now = Instant::now();
            let mut slot = now;
            if let Some(blocked) = state.blocked_until {
                if blocked > slot {
                    slot = blocked;
                } else {
                    state.blocked_until = None;
                }
            }
            if let Some(last) = state.last_request {
                slot = slot.max(last + state.current_delay);
            }
            state.last_request = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tracing::debug!(
                delay_ms = slot.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Rate limiter delaying request"
            );
            tokio::time::sleep_until(slot).await;
        }

        if let Some(ref pacer) = self.pacer {
            pacer.until_ready().await;
        }
    }

    /// Absorb quota reported by the provider.
    ///
    /// When the quota is exhausted, subsequent waits block until the reset
    /// time (capped at `max_delay`). An explicit retry-after takes precedence.
    pub fn update(&self, info: &RateLimitInfo) {
        let mut state = self.lock();
        let wait = if let Some(retry_after) = info.retry_after {
            Some(retry_after)
        } else if info.remaining == 0 {
            Some(
                (info.reset_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            )
        } else {
            None
        };

        if let Some(wait) = wait {
            let wait = wait.min(self.config.max_delay);
            tracing::debug!(
                remaining = info.remaining,
                limit = info.limit,
                wait_ms = wait.as_millis() as u64,
                "Provider quota exhausted"
            );
            Self::block_for(&mut state, wait);
        }
        state.quota = Some(info.clone());
    }

    /// Reset backoff after a successful call and absorb optional quota info.
    pub fn record_success(&self, info: Option<&RateLimitInfo>) {
        self.lock().current_delay = Duration::ZERO;
        if let Some(info) = info {
            self.update(info);
        }
    }

    /// Double the backoff and honor the provider's requested wait.
    pub fn record_rate_limit(&self, retry_after: Option<Duration>) {
        let mut state = self.lock();
        state.current_delay = self.next_delay(state.current_delay);
        if let Some(retry_after) = retry_after {
            Self::block_for(&mut state, retry_after.min(self.config.max_delay));
        }
        tracing::debug!(
            delay_ms = state.current_delay.as_millis() as u64,
            "Rate limited, backing off"
        );
    }

    /// Double the backoff without touching quota tracking.
    pub fn record_server_error(&self) {
        let mut state = self.lock();
        state.current_delay = self.next_delay(state.current_delay);
    }

    /// Gap currently enforced between requests.
    pub fn current_delay(&self) -> Duration {
        self.lock().current_delay
    }

    /// Last quota snapshot reported by the provider.
    pub fn quota(&self) -> Option<RateLimitInfo> {
        self.lock().quota.clone()
    }

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2)
            .max(self.config.initial_backoff)
            .min(self.config.max_delay)
    }

    fn block_for(state: &mut LimiterState, wait: Duration) {
        let until = Instant::now() + wait;
        if state.blocked_until.is_none_or(|b| b < until) {
            state.blocked_until = Some(until);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> AdaptiveRateLimiter {
        AdaptiveRateLimiter::new(LimiterConfig {
            initial_backoff: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            requests_per_second: None,
        })
    }

    #[test]
    fn test_default_rps_for_platform() {
        assert_eq!(default_rps_for_platform(Platform::Slack), 1);
        assert_eq!(default_rps_for_platform(Platform::Linear), 2);
        assert_eq!(default_rps_for_platform(Platform::Todoist), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let limiter = limiter();
        let mut seen = Vec::new();
        for _ in 0..6 {
            limiter.record_server_error();
            seen.push(limiter.current_delay().as_secs());
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn test_success_resets_backoff() {
        let limiter = limiter();
        limiter.record_rate_limit(None);
        limiter.record_rate_limit(None);
        assert_eq!(limiter.current_delay(), Duration::from_secs(2));

        limiter.record_success(None);
        assert_eq!(limiter.current_delay(), Duration::ZERO);

        limiter.record_server_error();
        assert_eq!(limiter.current_delay(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_immediate_without_backoff() {
        let limiter = limiter();
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_enforces_backoff_gap() {
        let limiter = limiter();
        limiter.wait().await;
        limiter.record_server_error();
        limiter.record_server_error();

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_honors_retry_after_capped_by_max_delay() {
        let limiter = limiter();
        limiter.record_rate_limit(Some(Duration::from_secs(120)));

        let start = Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(8));
        assert!(elapsed < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_blocks_until_reset() {
        let limiter = limiter();
        limiter.record_success(Some(&RateLimitInfo {
            limit: 100,
            remaining: 0,
            reset_at: Utc::now() + chrono::Duration::seconds(3),
            retry_after: None,
        }));
        assert_eq!(limiter.quota().map(|q| q.limit), Some(100));

        let start = Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_quota_does_not_block() {
        let limiter = limiter();
        limiter.update(&RateLimitInfo {
            limit: 100,
            remaining: 40,
            reset_at: Utc::now() + chrono::Duration::seconds(30),
            retry_after: None,
        });

        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
