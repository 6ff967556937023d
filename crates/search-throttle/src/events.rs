use search_core::{BackendId, CircuitState, SearchEvent};
use std::time::Instant;

/// Events emitted by [`crate::Throttler`].
#[derive(Debug, Clone)]
pub enum ThrottleEvent {
    StateTransition {
        backend: BackendId,
        to: CircuitState,
        timestamp: Instant,
    },
}

impl SearchEvent for ThrottleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ThrottleEvent::StateTransition { .. } => "state_transition",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ThrottleEvent::StateTransition { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        match self {
            ThrottleEvent::StateTransition { backend, .. } => backend.as_str(),
        }
    }
}
