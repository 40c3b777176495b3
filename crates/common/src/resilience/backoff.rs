//! Backoff schedule for transport retries
//!
//! The delay after the n-th failed attempt is `base × n`, so consecutive
//! delays are strictly increasing, and the number of attempts is capped by
//! `max_attempts`. The base is never below [`MIN_BASE`].

use std::time::Duration;

use tablemate_domain::RetryConfig;
use tracing::debug;

/// Smallest base delay a policy will use
pub const MIN_BASE: Duration = Duration::from_millis(1);

/// Bounded backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
}

impl Backoff {
    /// Create a policy; `max_attempts` is clamped to at least one and
    /// `base` to at least [`MIN_BASE`].
    #[must_use]
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base: base.max(MIN_BASE), max_attempts: max_attempts.max(1) }
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_backoff(), config.max_attempts)
    }

    /// Total attempts allowed, including the first
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after the `attempt`-th (1-based) failed attempt
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.max(1))
    }

    /// Every delay the policy can produce, in order
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(move |attempt| self.delay_for(attempt))
    }

    /// Sleep for the delay that follows the `attempt`-th failure.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_with_attempt_number() {
        let backoff = Backoff::new(Duration::from_millis(100), 4);

        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn schedule_is_strictly_increasing_and_bounded() {
        let backoff = Backoff::new(Duration::from_millis(250), 5);
        let delays: Vec<Duration> = backoff.schedule().collect();

        assert_eq!(delays.len(), 4);
        assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn retry_ceiling_is_respected() {
        let backoff = Backoff::new(Duration::from_millis(10), 3);

        assert!(backoff.allows_retry_after(1));
        assert!(backoff.allows_retry_after(2));
        assert!(!backoff.allows_retry_after(3));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let backoff = Backoff::new(Duration::from_millis(10), 0);
        assert_eq!(backoff.max_attempts(), 1);
        assert_eq!(backoff.schedule().count(), 0);
    }

    #[test]
    fn zero_base_clamped_so_schedule_still_increases() {
        let backoff = Backoff::new(Duration::ZERO, 4);
        let delays: Vec<Duration> = backoff.schedule().collect();

        assert_eq!(backoff.base(), MIN_BASE);
        assert_eq!(delays, vec![MIN_BASE, MIN_BASE * 2, MIN_BASE * 3]);
    }

    #[test]
    fn built_from_retry_config() {
        let config = RetryConfig { max_attempts: 5, base_backoff_ms: 40, timeout_ms: 1_000 };
        let backoff = Backoff::from_config(&config);

        assert_eq!(backoff.max_attempts(), 5);
        assert_eq!(backoff.base(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_scheduled_delay() {
        let backoff = Backoff::new(Duration::from_secs(2), 3);
        let started = tokio::time::Instant::now();

        backoff.wait(2).await;

        assert!(started.elapsed() >= Duration::from_secs(4));
    }
}
