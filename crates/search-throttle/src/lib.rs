//! C1: per-backend request pacing, jittered backoff, and circuit
//! breaking.
//!
//! Grounded on `tower-resilience-circuitbreaker`'s `Circuit` (state
//! machine shape, atomic state mirror) and on `intelligent_throttler.py`
//! (exact backoff/pacing formulas and failure-kind-specific recovery
//! timeout doubling).

mod backoff;
mod config;
mod events;

pub use backoff::{decorrelated_jitter_backoff, full_jitter_backoff, poisson_delay};
pub use config::ThrottleConfig;
pub use events::ThrottleEvent;

use search_core::{BackendHealth, BackendId, CircuitState, SearchError};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The kind of failure reported to [`Throttler::record_failure`]; anti-bot
/// failures (captcha / access-denied) get the doubled recovery timeout
/// treatment the reference implementation reserves for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    RateLimit,
    AntiBot,
}

struct BackendState {
    health: BackendHealth,
    state_atomic: Arc<AtomicU8>,
    recovery_timeout: Duration,
    opened_at: Option<Instant>,
}

impl BackendState {
    fn new(backend: BackendId) -> Self {
        Self {
            health: BackendHealth::new(backend),
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            recovery_timeout: Duration::from_secs(60),
            opened_at: None,
        }
    }

    fn set_state(&mut self, state: CircuitState) {
        self.health.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
    }
}

/// Per-backend throttler: paces requests, applies jittered backoff after
/// failures, and trips a circuit breaker after consecutive failures.
pub struct Throttler {
    config: ThrottleConfig,
    backends: Mutex<HashMap<BackendId, BackendState>>,
    last_request_time: Mutex<Option<Instant>>,
    listeners: search_core::EventListeners<ThrottleEvent>,
}

impl Throttler {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            backends: Mutex::new(HashMap::new()),
            last_request_time: Mutex::new(None),
            listeners: search_core::EventListeners::new(),
        }
    }

    pub fn with_listeners(config: ThrottleConfig, listeners: search_core::EventListeners<ThrottleEvent>) -> Self {
        Self {
            config,
            backends: Mutex::new(HashMap::new()),
            last_request_time: Mutex::new(None),
            listeners,
        }
    }

    /// Returns the circuit state for `backend` without awaiting the async
    /// lock, via the atomic mirror — safe to call from sync health checks.
    pub async fn state_sync(&self, backend: &BackendId) -> CircuitState {
        let backends = self.backends.lock().await;
        backends
            .get(backend)
            .map(|s| CircuitState::from_u8(s.state_atomic.load(Ordering::Acquire)))
            .unwrap_or(CircuitState::Closed)
    }

    /// Waits the pacing/backoff delay for `backend`, or returns
    /// `CircuitOpen` immediately if the breaker is open and the recovery
    /// timeout hasn't elapsed.
    pub async fn acquire(&self, backend: &BackendId) -> Result<(), SearchError<Infallible>> {
        let delay = {
            let mut backends = self.backends.lock().await;
            let entry = backends
                .entry(backend.clone())
                .or_insert_with(|| BackendState::new(backend.clone()));

            match entry.health.state {
                CircuitState::Open => {
                    let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                    if elapsed >= entry.recovery_timeout {
                        entry.set_state(CircuitState::HalfOpen);
                        self.listeners.emit(&ThrottleEvent::StateTransition {
                            backend: backend.clone(),
                            to: CircuitState::HalfOpen,
                            timestamp: Instant::now(),
                        });
                    } else {
                        return Err(SearchError::CircuitOpen {
                            backend: backend.clone(),
                        });
                    }
                }
                CircuitState::Closed | CircuitState::HalfOpen => {}
            }

            entry.health.total_requests += 1;

            let delay = if entry.health.consecutive_failures > 0 {
                full_jitter_backoff(
                    entry.health.consecutive_failures,
                    self.config.base_delay,
                    self.config.max_delay,
                )
            } else {
                let mut last = self.last_request_time.lock().await;
                let since_last = last.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                let target = poisson_delay(
                    self.config.poisson_rate,
                    self.config.min_human_delay,
                    self.config.max_human_delay,
                );
                *last = Some(Instant::now());
                target.saturating_sub(since_last)
            };

            delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    pub async fn record_success(&self, backend: &BackendId) {
        let mut backends = self.backends.lock().await;
        let entry = backends
            .entry(backend.clone())
            .or_insert_with(|| BackendState::new(backend.clone()));

        entry.health.consecutive_failures = 0;
        entry.health.current_backoff = Duration::ZERO;
        entry.health.last_success = Some(Instant::now());

        if entry.health.state == CircuitState::HalfOpen {
            entry.set_state(CircuitState::Closed);
            entry.recovery_timeout = self.config.recovery_timeout;
            self.listeners.emit(&ThrottleEvent::StateTransition {
                backend: backend.clone(),
                to: CircuitState::Closed,
                timestamp: Instant::now(),
            });
        }
    }

    pub async fn record_failure(&self, backend: &BackendId, kind: FailureKind) {
        let mut backends = self.backends.lock().await;
        let entry = backends
            .entry(backend.clone())
            .or_insert_with(|| BackendState::new(backend.clone()));

        entry.health.consecutive_failures += 1;
        entry.health.total_failures += 1;
        entry.health.last_failure = Some(Instant::now());
        entry.health.current_backoff = decorrelated_jitter_backoff(
            entry.health.current_backoff.max(self.config.base_delay),
            self.config.base_delay,
            self.config.max_delay,
        );

        if kind == FailureKind::AntiBot {
            entry.recovery_timeout =
                (entry.recovery_timeout * 2).min(self.config.max_recovery_timeout);
        }

        if entry.health.consecutive_failures >= self.config.failure_threshold
            && entry.health.state != CircuitState::Open
        {
            entry.set_state(CircuitState::Open);
            entry.opened_at = Some(Instant::now());
            self.listeners.emit(&ThrottleEvent::StateTransition {
                backend: backend.clone(),
                to: CircuitState::Open,
                timestamp: Instant::now(),
            });
        } else if entry.health.state == CircuitState::HalfOpen {
            entry.set_state(CircuitState::Open);
            entry.opened_at = Some(Instant::now());
        }
    }

    pub async fn status(&self, backend: &BackendId) -> Option<BackendHealth> {
        let backends = self.backends.lock().await;
        backends.get(backend).map(|s| s.health.clone())
    }

    pub async fn all_status(&self) -> Vec<BackendHealth> {
        let backends = self.backends.lock().await;
        backends.values().map(|s| s.health.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(name: &str) -> BackendId {
        BackendId::new(name)
    }

    #[tokio::test]
    async fn circuit_opens_after_consecutive_failures() {
        let throttler = Throttler::new(ThrottleConfig::default());
        let b = backend("brave");

        for _ in 0..3 {
            throttler.record_failure(&b, FailureKind::Transient).await;
        }

        assert_eq!(throttler.state_sync(&b).await, CircuitState::Open);
        let result = throttler.acquire(&b).await;
        assert!(matches!(result, Err(SearchError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn a_success_between_failures_resets_the_counter() {
        let throttler = Throttler::new(ThrottleConfig::default());
        let b = backend("bing");

        throttler.record_failure(&b, FailureKind::Transient).await;
        throttler.record_failure(&b, FailureKind::Transient).await;
        throttler.record_success(&b).await;
        throttler.record_failure(&b, FailureKind::Transient).await;

        assert_eq!(throttler.state_sync(&b).await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn anti_bot_failure_doubles_recovery_timeout() {
        let throttler = Throttler::new(ThrottleConfig::default());
        let b = backend("mojeek");

        for _ in 0..3 {
            throttler.record_failure(&b, FailureKind::AntiBot).await;
        }

        let backends = throttler.backends.lock().await;
        let state = backends.get(&b).unwrap();
        assert_eq!(state.recovery_timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn half_open_success_closes_the_circuit() {
        let config = ThrottleConfig {
            recovery_timeout: Duration::from_millis(10),
            ..ThrottleConfig::default()
        };
        let throttler = Throttler::new(config);
        let b = backend("wikipedia");

        for _ in 0..3 {
            throttler.record_failure(&b, FailureKind::Transient).await;
        }
        assert_eq!(throttler.state_sync(&b).await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(throttler.acquire(&b).await.is_ok());
        assert_eq!(throttler.state_sync(&b).await, CircuitState::HalfOpen);

        throttler.record_success(&b).await;
        assert_eq!(throttler.state_sync(&b).await, CircuitState::Closed);
    }
}
