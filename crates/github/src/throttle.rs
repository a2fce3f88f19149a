//! Client-side request throttling and rate-limit retries.
//!
//! [`Throttle`] is a token bucket shared by every clone of a client: `burst`
//! requests may go out back to back, after which one token is released every
//! `1h / per_hour`. It is tracked as a theoretical arrival time so no
//! background task is needed.

use std::time::Duration;

use labels::ClientError;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Hourly request budget used when none is configured.
pub const DEFAULT_TOKENS_PER_HOUR: u32 = 300;

/// Requests allowed back to back before throttling starts.
pub const DEFAULT_TOKEN_BURST: u32 = 100;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Token-bucket limit on outgoing requests.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    tolerance: Duration,
    next_at: Mutex<Instant>,
}

impl Throttle {
    /// Allows `per_hour` requests per hour with bursts of up to `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if either value is zero.
    pub fn new(per_hour: u32, burst: u32) -> Result<Self, ClientError> {
        if per_hour == 0 || burst == 0 {
            return Err(ClientError::Transport(format!(
                "throttle needs a non-zero rate and burst, got {per_hour}/h burst {burst}"
            )));
        }
        let interval = HOUR / per_hour;
        Ok(Self {
            interval,
            tolerance: interval * (burst - 1),
            next_at: Mutex::new(Instant::now()),
        })
    }

    /// Time between tokens once the burst is spent.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a token is available and takes it.
    ///
    /// Callers queue on the lock, so tokens are handed out in arrival order.
    pub async fn acquire(&self) {
        let mut next_at = self.next_at.lock().await;
        let now = Instant::now();
        let due = (*next_at).max(now);
        if let Some(ready_at) = due.checked_sub(self.tolerance) {
            if ready_at > now {
                sleep_until(ready_at).await;
            }
        }
        *next_at = due + self.interval;
    }
}

/// How long and how often to wait out an exhausted rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying.
    pub attempts: u32,
    /// Longest single wait. A reset further away than this is not waited for.
    pub max_wait: Duration,
    /// Wait used when the response carries no reset time.
    pub fallback_wait: Duration,
}

impl RetryPolicy {
    /// Never retries.
    pub const NONE: Self = Self {
        attempts: 0,
        max_wait: Duration::ZERO,
        fallback_wait: Duration::ZERO,
    };

    /// Delay before retry number `attempt` (zero based) given the server's
    /// `reset_in`, or `None` when the caller should give up.
    pub fn wait_for(&self, attempt: u32, reset_in: Option<Duration>) -> Option<Duration> {
        if attempt >= self.attempts {
            return None;
        }
        let wait = reset_in.unwrap_or(self.fallback_wait);
        (wait <= self.max_wait).then_some(wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            max_wait: HOUR,
            fallback_wait: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_or_burst_is_rejected() {
        assert!(Throttle::new(0, 10).is_err());
        assert!(Throttle::new(300, 0).is_err());
    }

    #[test]
    fn test_interval_spreads_the_hourly_budget() {
        let throttle = Throttle::new(300, 100).unwrap();
        assert_eq!(throttle.interval(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_passes_then_requests_are_spaced() {
        let throttle = Throttle::new(3600, 2).unwrap();
        let start = Instant::now();

        throttle.acquire().await;
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_the_bucket() {
        let throttle = Throttle::new(3600, 2).unwrap();
        throttle.acquire().await;
        throttle.acquire().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_retry_waits_for_the_reset_within_bounds() {
        let policy = RetryPolicy {
            attempts: 2,
            max_wait: Duration::from_secs(120),
            fallback_wait: Duration::from_secs(30),
        };

        assert_eq!(
            policy.wait_for(0, Some(Duration::from_secs(60))),
            Some(Duration::from_secs(60))
        );
        assert_eq!(policy.wait_for(1, None), Some(Duration::from_secs(30)));
        assert_eq!(policy.wait_for(2, Some(Duration::ZERO)), None);
        assert_eq!(policy.wait_for(0, Some(Duration::from_secs(3600))), None);
        assert_eq!(RetryPolicy::NONE.wait_for(0, Some(Duration::ZERO)), None);
    }
}
