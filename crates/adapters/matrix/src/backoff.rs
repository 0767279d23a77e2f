//! Exponential backoff with jitter for retrying failed syncs.

use lib::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Delay schedule: `initial * multiplier^attempt`, capped at `max`, randomized by `jitter`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Delay before retry number `attempt` (0 = first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let base = (self.initial.as_secs_f64() * self.multiplier.powi(exp))
            .min(self.max.as_secs_f64());
        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let factor = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((base * (1.0 + factor)).max(0.0)).min(self.max)
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(c: &BackoffConfig) -> Self {
        Backoff::new(
            Duration::from_millis(c.initial_ms),
            Duration::from_millis(c.max_ms),
            c.multiplier,
            c.jitter,
        )
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::from(&BackoffConfig::default())
    }
}
