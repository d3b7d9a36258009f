//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 returns zero delay.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, growth_factor: f64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let factor = growth_factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
    let delay_ms = (base_ms as f64 * factor).min(max_ms as f64) as u64;

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth() {
        let b1 = calculate_backoff(1, 100, 2000, 1.5);
        assert!(b1.as_millis() >= 100);
        assert!(b1.as_millis() <= 110);

        let b2 = calculate_backoff(2, 100, 2000, 1.5);
        assert!(b2.as_millis() >= 150);

        let b3 = calculate_backoff(3, 100, 2000, 1.5);
        assert!(b3.as_millis() >= 225);
    }

    #[test]
    fn test_backoff_cap() {
        let max = calculate_backoff(20, 100, 1000, 1.5);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() <= 1100);
    }

    #[test]
    fn test_zero_attempt_is_immediate() {
        assert_eq!(calculate_backoff(0, 100, 1000, 1.5).as_millis(), 0);
    }

    #[test]
    fn test_factor_below_one_clamped() {
        let b = calculate_backoff(5, 100, 1000, 0.2);
        assert!(b.as_millis() >= 100);
    }
}
