use std::time::Duration;

pub const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            base_delay_ms: BASE_BACKOFF_MS,
            max_retries,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(self.base_delay_ms.saturating_mul(exp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delays() {
        let policy = RetryPolicy::new(2);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.delay_for(200) >= policy.delay_for(16));
    }
}
