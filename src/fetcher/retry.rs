use rand::Rng;
use std::time::Duration;

/// Backoff policy for transient fetch failures. Only network errors are
/// retried; parse and blocked outcomes surface immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt: base plus a random jitter.
    pub fn backoff(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        let jitter = rand::rng().random_range(0..=jitter_ms);
        self.base_delay + Duration::from_millis(jitter)
    }
}
