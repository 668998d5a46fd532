//! Exponential backoff with jitter.
//!
//! Used by the lease acquisition loop, the cache reflectors' re-list path and
//! the runner's requeue path.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    Duration::from_millis(capped_delay + jitter(capped_delay))
}

/// A fixed period plus up to 10% jitter, so replicas do not retry in lockstep.
pub fn jittered(period: Duration) -> Duration {
    let ms = period.as_millis() as u64;
    Duration::from_millis(ms + jitter(ms))
}

fn jitter(delay_ms: u64) -> u64 {
    let jitter_range = delay_ms / 10;
    if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let b1 = calculate_backoff(1, base, Duration::from_millis(2000));
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b2 = calculate_backoff(2, base, Duration::from_millis(2000));
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, base, Duration::from_millis(1000));
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);

        assert_eq!(calculate_backoff(0, base, Duration::from_millis(1000)), Duration::ZERO);
    }

    #[test]
    fn test_jittered_stays_within_ten_percent() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(2000));
            assert!(d >= Duration::from_millis(2000) && d < Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let d = calculate_backoff(u32::MAX, Duration::from_millis(50), Duration::from_secs(5));
        assert!(d >= Duration::from_secs(5));
    }
}
