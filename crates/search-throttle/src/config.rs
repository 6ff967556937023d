use std::time::Duration;

/// Tunables for [`crate::Throttler`], defaulting to the constants in
/// `intelligent_throttler.py` (pacing bounds widened per the spec's
/// documented `[0.5s, 6.0s]` human-delay clamp).
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub min_human_delay: Duration,
    pub max_human_delay: Duration,
    pub poisson_rate: f64,
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub max_recovery_timeout: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            min_human_delay: Duration::from_millis(500),
            max_human_delay: Duration::from_secs(6),
            poisson_rate: 0.5,
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            max_recovery_timeout: Duration::from_secs(600),
        }
    }
}
