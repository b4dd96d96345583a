//! Reconnection backoff schedule, per spec.md §4.10: 500 ms start,
//! factor 2, capped at 10 s, ±20% jitter, max 3 attempts.

use std::time::Duration;

const START: Duration = Duration::from_millis(500);
const CAP: Duration = Duration::from_secs(10);
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff for the given 1-indexed attempt number, jittered ±20%.
pub fn backoff_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(8);
    let base = START.saturating_mul(1u32 << doublings).min(CAP);
    jitter(base)
}

fn jitter(base: Duration) -> Duration {
    let factor = 0.8 + fastrand::f64() * 0.4;
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_roughly_the_start_interval() {
        let delay = backoff_delay(1);
        assert!(delay >= Duration::from_millis(400) && delay <= Duration::from_millis(600));
    }

    #[test]
    fn delay_doubles_then_caps() {
        let third = backoff_delay(3);
        assert!(third >= Duration::from_millis(1600) && third <= Duration::from_millis(2400));
        let tenth = backoff_delay(10);
        assert!(tenth <= Duration::from_secs(12));
    }

    #[test]
    fn max_attempts_constant_matches_spec() {
        assert_eq!(MAX_ATTEMPTS, 3);
    }
}
