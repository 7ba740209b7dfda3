//! Canned backoff strategies for node retry.
//!
//! A backoff function maps the 1-based number of the attempt that just
//! failed to the delay slept before the next attempt. Any
//! `Fn(u32) -> Duration` works; the constructors here cover the common
//! shapes, with full jitter variants to avoid retry stampedes.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Backoff strategy: delay to sleep after the given (1-based) attempt.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Constant-slope backoff: `base * attempt`.
#[must_use]
pub fn linear(base: Duration) -> BackoffFn {
    Arc::new(move |attempt| base.saturating_mul(attempt.max(1)))
}

/// Linear backoff with full jitter: uniform in `0..=base * attempt`.
#[must_use]
pub fn linear_with_jitter(base: Duration) -> BackoffFn {
    Arc::new(move |attempt| jittered(base.saturating_mul(attempt.max(1))))
}

/// Exponential backoff: `base * 2^(attempt - 1)`.
#[must_use]
pub fn exponential(base: Duration) -> BackoffFn {
    Arc::new(move |attempt| exponential_delay(base, attempt))
}

/// Exponential backoff with full jitter: uniform in
/// `0..=base * 2^(attempt - 1)`.
#[must_use]
pub fn exponential_with_jitter(base: Duration) -> BackoffFn {
    Arc::new(move |attempt| jittered(exponential_delay(base, attempt)))
}

fn exponential_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.max(1) - 1))
}

fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let nanos = delay.as_nanos().min(u128::from(u64::MAX)) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_scales_with_attempt() {
        let backoff = linear(Duration::from_millis(10));
        assert_eq!(backoff(1), Duration::from_millis(10));
        assert_eq!(backoff(3), Duration::from_millis(30));
    }

    #[test]
    fn test_linear_treats_attempt_zero_as_one() {
        let backoff = linear(Duration::from_millis(10));
        assert_eq!(backoff(0), Duration::from_millis(10));
    }

    #[test]
    fn test_exponential_doubles() {
        let backoff = exponential(Duration::from_millis(5));
        assert_eq!(backoff(1), Duration::from_millis(5));
        assert_eq!(backoff(2), Duration::from_millis(10));
        assert_eq!(backoff(4), Duration::from_millis(40));
    }

    #[test]
    fn test_exponential_saturates() {
        let backoff = exponential(Duration::from_secs(u64::MAX / 2));
        assert_eq!(backoff(40), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let backoff = exponential_with_jitter(Duration::from_millis(8));
        for attempt in 1..=4 {
            let bound = Duration::from_millis(8).saturating_mul(1 << (attempt - 1));
            for _ in 0..64 {
                assert!(backoff(attempt) <= bound);
            }
        }
    }

    #[test]
    fn test_jitter_of_zero_is_zero() {
        let backoff = linear_with_jitter(Duration::ZERO);
        assert_eq!(backoff(5), Duration::ZERO);
    }
}
