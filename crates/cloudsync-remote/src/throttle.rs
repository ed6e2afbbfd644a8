//! Adaptive throttling of connector calls
//!
//! Paces outbound requests to the remote store so a struggling backend is not
//! hammered with retries.
//!
//! ## Algorithm
//!
//! A single delay, the throttle duration, separates the completion of one call
//! from the start of the next. Failures grow it (to the server's `Retry-After`
//! when one was sent, otherwise by doubling), successes shrink it to two
//! thirds. Shrinking slower than growing keeps the client from thrashing
//! between the two.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cloudsync_remote::throttle::AdaptiveThrottle;
//!
//! # async fn example() {
//! let throttle = AdaptiveThrottle::new(Duration::ZERO, Duration::from_secs(600));
//! throttle.wait_turn().await;
//! // ... call the backend ...
//! throttle.on_success();
//! # }
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use cloudsync_core::config::ThrottleConfig;

/// Default upper bound of the throttle duration
pub const MAX_THROTTLE_DURATION: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct ThrottleInner {
    /// Delay between the end of one call and the start of the next
    duration: Duration,
    /// When the last call completed; `None` before the first call
    last_call_completed: Option<Instant>,
}

/// Adaptive delay between consecutive connector calls
///
/// Thread-safe and designed to be shared via `Arc<AdaptiveThrottle>`.
#[derive(Debug)]
pub struct AdaptiveThrottle {
    min: Duration,
    max: Duration,
    inner: Mutex<ThrottleInner>,
}

impl AdaptiveThrottle {
    /// Creates a throttle bounded by `[min, max]`, starting at `min`
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            inner: Mutex::new(ThrottleInner {
                duration: min,
                last_call_completed: None,
            }),
        }
    }

    /// Creates a throttle from the `throttle` configuration section
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(config.min(), config.max())
    }

    fn lock(&self) -> MutexGuard<'_, ThrottleInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the current throttle duration
    pub fn duration(&self) -> Duration {
        self.lock().duration
    }

    /// Returns the lower bound
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Returns the upper bound
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns how long the next call must still wait
    pub fn time_until_ready(&self) -> Duration {
        let inner = self.lock();
        match inner.last_call_completed {
            Some(completed) => (completed + inner.duration).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Waits until the next call may start
    ///
    /// The deadline is re-read after every sleep so a duration change made by
    /// a concurrent completion is honoured.
    pub async fn wait_turn(&self) {
        loop {
            let wait = self.time_until_ready();
            if wait.is_zero() {
                return;
            }

            debug!(wait_ms = wait.as_millis() as u64, "Throttling next connector call");
            tokio::time::sleep(wait).await;
        }
    }

    /// Records a successful call and shrinks the duration to two thirds
    pub fn on_success(&self) {
        let mut inner = self.lock();
        inner.last_call_completed = Some(Instant::now());

        let next = (inner.duration * 2 / 3).max(self.min);
        Self::set_duration(&mut inner, next);
    }

    /// Records a failed call and grows the duration
    ///
    /// Uses the server-suggested delay when present, otherwise doubles the
    /// current duration. Either way the result is capped at the maximum.
    pub fn on_failure(&self, retry_after: Option<Duration>) {
        let mut inner = self.lock();
        inner.last_call_completed = Some(Instant::now());

        let next = retry_after
            .unwrap_or_else(|| inner.duration.saturating_mul(2))
            .min(self.max);
        Self::set_duration(&mut inner, next);
    }

    fn set_duration(inner: &mut ThrottleInner, next: Duration) {
        let previous = inner.duration;
        inner.duration = next;

        if next > previous {
            info!(
                from_secs = previous.as_secs_f64(),
                to_secs = next.as_secs_f64(),
                "Increasing throttle duration"
            );
        } else if next < previous {
            info!(
                from_secs = previous.as_secs_f64(),
                to_secs = next.as_secs_f64(),
                "Decreasing throttle duration"
            );
        }
    }
}

impl Default for AdaptiveThrottle {
    fn default() -> Self {
        Self::new(Duration::ZERO, MAX_THROTTLE_DURATION)
    }
}

// ============================================================================
// Retry-After parsing
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - A number of seconds (e.g., "30" or "1.5")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT"), converted to the
///   time remaining from now and capped at [`MAX_THROTTLE_DURATION`]
///
/// Falls back to the default duration if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Duration::from_secs_f64(seconds);
        }
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return match remaining.to_std() {
            Ok(remaining) => remaining.min(MAX_THROTTLE_DURATION),
            // Dates in the past mean "retry now"
            Err(_) => Duration::ZERO,
        };
    }

    warn!(value, "Could not parse Retry-After value, using default");
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> AdaptiveThrottle {
        AdaptiveThrottle::default()
    }

    #[test]
    fn test_starts_at_minimum() {
        let t = AdaptiveThrottle::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(t.duration(), Duration::from_secs(1));
        assert_eq!(t.time_until_ready(), Duration::ZERO);
    }

    #[test]
    fn test_max_never_below_min() {
        let t = AdaptiveThrottle::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(t.max(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_failure_doubles_duration() {
        let t = throttle();
        t.on_failure(Some(Duration::from_secs(3)));
        t.on_failure(None);
        assert_eq!(t.duration(), Duration::from_secs(6));
        t.on_failure(None);
        assert_eq!(t.duration(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_doubling_from_zero_stays_zero() {
        let t = throttle();
        t.on_failure(None);
        assert_eq!(t.duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_failure_capped_at_max() {
        let t = throttle();
        t.on_failure(Some(Duration::from_secs(400)));
        t.on_failure(None);
        assert_eq!(t.duration(), MAX_THROTTLE_DURATION);

        t.on_failure(Some(Duration::from_secs(3600)));
        assert_eq!(t.duration(), MAX_THROTTLE_DURATION);
    }

    #[tokio::test]
    async fn test_retry_after_overrides_current_duration() {
        let t = throttle();
        t.on_failure(Some(Duration::from_secs(100)));
        t.on_failure(Some(Duration::from_secs(5)));
        assert_eq!(t.duration(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_decays_by_two_thirds() {
        let t = throttle();
        t.on_failure(Some(Duration::from_secs(9)));
        t.on_success();
        assert_eq!(t.duration(), Duration::from_secs(6));
        t.on_success();
        assert_eq!(t.duration(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_success_floors_at_min() {
        let t = AdaptiveThrottle::new(Duration::from_secs(2), Duration::from_secs(600));
        t.on_failure(Some(Duration::from_secs(3)));
        t.on_success();
        assert_eq!(t.duration(), Duration::from_secs(2));

        let t = throttle();
        for _ in 0..200 {
            t.on_success();
        }
        assert_eq!(t.duration(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_turn_waits_for_duration_after_last_call() {
        let t = throttle();
        t.on_failure(Some(Duration::from_secs(30)));
        assert_eq!(t.time_until_ready(), Duration::from_secs(30));

        let started = Instant::now();
        t.wait_turn().await;
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(t.time_until_ready(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_turn_returns_immediately_before_first_call() {
        let t = throttle();
        let started = Instant::now();
        t.wait_turn().await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    // ====================================================================
    // Retry-After parsing tests
    // ====================================================================

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(
            parse_retry_after("30", Duration::from_secs(1)),
            Duration::from_secs(30)
        );
        assert_eq!(
            parse_retry_after(" 2.5 ", Duration::from_secs(1)),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_parse_retry_after_http_date_in_past() {
        let value = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(parse_retry_after(value, Duration::from_secs(9)), Duration::ZERO);
    }

    #[test]
    fn test_parse_retry_after_http_date_in_future() {
        let target = chrono::Utc::now() + chrono::Duration::seconds(120);
        let value = target.to_rfc2822();
        let parsed = parse_retry_after(&value, Duration::ZERO);
        assert!(parsed <= Duration::from_secs(120));
        assert!(parsed >= Duration::from_secs(115));
    }

    #[test]
    fn test_parse_retry_after_invalid_uses_default() {
        let default = Duration::from_secs(7);
        assert_eq!(parse_retry_after("soon", default), default);
        assert_eq!(parse_retry_after("-3", default), default);
    }
}
