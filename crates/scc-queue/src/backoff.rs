//! Retry backoff math: `delay = base * 2^(attempt-1) + jitter`, capped.
//!
//! Full jitter per Marc Brooker's "Exponential Backoff and Jitter" AWS
//! Architecture post: the delay is sampled uniformly from `[0, capped_delay]`
//! rather than added on top of it, which spreads retries more evenly under
//! contention than fixed or additive jitter.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            cap: Duration::from_secs(30 * 60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before retrying `attempt` (1-indexed: the attempt that just failed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        let exponential = self.base.saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX));
        let capped = exponential.min(self.cap);
        full_jitter(capped)
    }
}

fn full_jitter(capped: Duration) -> Duration {
    if capped.is_zero() {
        return capped;
    }
    let millis = capped.as_millis().min(u128::from(u64::MAX)) as u64;
    let jittered = rand::thread_rng().gen_range(0..=millis);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_before_capping() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(1000));
        for attempt in 1..=5 {
            let delay = policy.delay_for_attempt(attempt);
            let max_for_attempt = Duration::from_secs(2u64.pow(attempt - 1));
            assert!(delay <= max_for_attempt, "attempt {attempt}: {delay:?} > {max_for_attempt:?}");
        }
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let policy = BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(1800));
        for attempt in 1..=20 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_secs(1800));
        }
    }

    #[test]
    fn zero_cap_yields_zero_delay() {
        let policy = BackoffPolicy::new(Duration::from_secs(60), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
    }
}
