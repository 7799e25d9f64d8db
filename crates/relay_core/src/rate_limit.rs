use std::time::{Duration, Instant};

use crate::error::{RelayError, Result};

/// Cooldown between consecutive exchange attempts.
///
/// Every attempt restarts the cooldown, rejected ones included, so a user
/// who keeps sending stays throttled.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_attempt: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_attempt: None,
        }
    }

    pub fn admit(&mut self) -> Result<()> {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&mut self, now: Instant) -> Result<()> {
        let previous = self.last_attempt.replace(now);
        let Some(previous) = previous else {
            return Ok(());
        };

        let elapsed = now.saturating_duration_since(previous);
        if elapsed >= self.cooldown {
            return Ok(());
        }

        let remaining = self.cooldown - elapsed;
        let seconds_remaining = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Err(RelayError::RateLimited { seconds_remaining })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_always_admitted() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        assert!(limiter.admit_at(Instant::now()).is_ok());
    }

    #[test]
    fn attempt_within_cooldown_is_rejected_with_positive_wait() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.admit_at(start).unwrap();

        let err = limiter
            .admit_at(start + Duration::from_millis(1500))
            .unwrap_err();
        assert!(matches!(err, RelayError::RateLimited { seconds_remaining: 4 }));
    }

    #[test]
    fn attempt_after_cooldown_is_admitted() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.admit_at(start).unwrap();
        assert!(limiter.admit_at(start + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn rejected_attempts_restart_the_cooldown() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.admit_at(start).unwrap();
        assert!(limiter.admit_at(start + Duration::from_secs(4)).is_err());
        // 6s after the first attempt but only 2s after the rejected one.
        assert!(limiter.admit_at(start + Duration::from_secs(6)).is_err());
        assert!(limiter.admit_at(start + Duration::from_secs(12)).is_ok());
    }

    #[test]
    fn zero_cooldown_never_limits() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.admit_at(now).is_ok());
        }
    }
}
