//! Jitter and pacing primitives, grounded on `IntervalFunction` in
//! `tower-retry-plus` and the exact formulas of `intelligent_throttler.py`.

use rand::Rng;
use std::time::Duration;

/// `uniform(0, min(cap, base * 2^failures))` — AWS-style full jitter.
pub fn full_jitter_backoff(failures: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.mul_f64(2f64.powi(failures as i32)).min(cap);
    let exp_secs = exp.as_secs_f64();
    if exp_secs <= 0.0 {
        return Duration::ZERO;
    }
    let sampled = rand::rng().random_range(0.0..=exp_secs);
    Duration::from_secs_f64(sampled)
}

/// `uniform(base, min(previous * 3, cap))` — decorrelated jitter, used to
/// compute the backoff stored for the *next* attempt after a failure.
pub fn decorrelated_jitter_backoff(previous: Duration, base: Duration, cap: Duration) -> Duration {
    let upper = previous.mul_f64(3.0).min(cap).max(base);
    let sampled = rand::rng().random_range(base.as_secs_f64()..=upper.as_secs_f64());
    Duration::from_secs_f64(sampled)
}

/// Exponential inter-arrival delay with mean `1/rate`, clamped to
/// `[min, max]` — models human request pacing.
pub fn poisson_delay(rate: f64, min: Duration, max: Duration) -> Duration {
    let u: f64 = rand::rng().random_range(f64::EPSILON..1.0);
    let sample = -u.ln() / rate;
    Duration::from_secs_f64(sample).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_jitter_never_exceeds_cap() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(60);
        for failures in 0..10 {
            for _ in 0..200 {
                let d = full_jitter_backoff(failures, base, cap);
                assert!(d <= cap);
            }
        }
    }

    #[test]
    fn decorrelated_jitter_is_never_below_base() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(60);
        let mut previous = base;
        for _ in 0..200 {
            let d = decorrelated_jitter_backoff(previous, base, cap);
            assert!(d >= base);
            assert!(d <= cap);
            previous = d;
        }
    }

    #[test]
    fn poisson_delay_respects_clamp() {
        let min = Duration::from_millis(500);
        let max = Duration::from_secs(6);
        for _ in 0..500 {
            let d = poisson_delay(0.5, min, max);
            assert!(d >= min && d <= max);
        }
    }
}
