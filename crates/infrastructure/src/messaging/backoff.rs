//! Deterministic exponential backoff for the retry topology

/// Retry and backoff parameters for the consumer dispatcher
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Failed attempts after which a message is parked in the DLQ
    pub max_retries: u32,
    pub initial_backoff_seconds: u64,
    /// Cap on the computed delay; doubles as the retry queue's message TTL
    pub max_backoff_seconds: u64,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_seconds: 1,
            max_backoff_seconds: 60,
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Delay in milliseconds before the retry following failure number
    /// `retry_count`: `min(initial * multiplier^retry_count, cap)`.
    ///
    /// Deterministic; no jitter. The per-message TTL on the retry queue
    /// already spreads redeliveries out in time.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_ms(&self, retry_count: u32) -> u64 {
        let delay_seconds = (self.initial_backoff_seconds as f64)
            * self.multiplier.powi(retry_count as i32);
        let capped_seconds = delay_seconds.min(self.max_backoff_seconds as f64);

        (capped_seconds * 1000.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_doubles_per_attempt() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay_ms(0), 1_000);
        assert_eq!(policy.delay_ms(1), 2_000);
        assert_eq!(policy.delay_ms(2), 4_000);
        assert_eq!(policy.delay_ms(3), 8_000);
    }

    #[test]
    fn delay_is_capped_at_max_backoff() {
        let policy = BackoffPolicy::default();

        // 2^6 = 64 > 60
        assert_eq!(policy.delay_ms(6), 60_000);
        assert_eq!(policy.delay_ms(30), 60_000);
    }

    #[test]
    fn multiplier_of_one_gives_constant_delay() {
        let policy = BackoffPolicy {
            multiplier: 1.0,
            ..BackoffPolicy::default()
        };

        assert_eq!(policy.delay_ms(0), 1_000);
        assert_eq!(policy.delay_ms(5), 1_000);
    }

    #[test]
    fn zero_initial_backoff_degenerates_to_zero_delay() {
        let policy = BackoffPolicy {
            initial_backoff_seconds: 0,
            ..BackoffPolicy::default()
        };

        assert_eq!(policy.delay_ms(0), 0);
        assert_eq!(policy.delay_ms(4), 0);
    }
}
