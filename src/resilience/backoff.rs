//! Exponential backoff with jitter, used between readiness polls.

use std::time::Duration;
use rand::Rng;

/// Delay before poll `attempt` (1-based): `base * 2^(attempt-1)`, capped at `max_ms`,
/// plus up to 10% jitter so several daemons do not poll in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);

        let first = calculate_backoff(1, 100, 1000).as_millis();
        assert!((100..110).contains(&first));

        let third = calculate_backoff(3, 100, 1000).as_millis();
        assert!((400..440).contains(&third));

        let capped = calculate_backoff(20, 100, 1000).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let d = calculate_backoff(u32::MAX, u64::MAX, 5_000);
        assert!(d.as_millis() >= 5_000);
    }
}
