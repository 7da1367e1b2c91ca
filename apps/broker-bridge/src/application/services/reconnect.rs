//! Exponential backoff with jitter for broker session recovery.
//!
//! The diff stream dies with its connection; every restart of the monitor
//! loop goes through this policy so a flapping broker link cannot turn into
//! a tight reconnect spin.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Exponential multiplier applied per attempt.
    pub multiplier: f64,
    /// Jitter fraction (0.1 = plus or minus 10%).
    pub jitter_factor: f64,
    /// Maximum attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Backoff state for one broker session.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a fresh policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Next sleep before retrying, or `None` once attempts are exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay)
    }

    /// Reset after a healthy session.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(adjusted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        })
    }

    #[test]
    fn delays_double_until_cap() {
        let mut policy = no_jitter(100, 500, 0);
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(100));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(200));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(400));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(500));
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn attempts_are_bounded_when_configured() {
        let mut policy = no_jitter(100, 500, 2);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restores_initial_delay() {
        let mut policy = no_jitter(100, 500, 0);
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay().unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                initial_delay: Duration::from_millis(1000),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
                jitter_factor: 0.1,
                max_attempts: 0,
            });
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of bounds");
        }
    }
}
