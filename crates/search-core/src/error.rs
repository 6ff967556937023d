//! Unified error type for the search orchestration engine.
//!
//! Mirrors the shape of `ResilienceError<E>`: a closed set of
//! infrastructure-level variants plus an `Application(E)` escape hatch,
//! with `is_*` predicate helpers so callers composing several of these
//! components don't need per-layer `From` impls.

use std::fmt;
use std::time::Duration;

use crate::model::BackendId;

/// Errors produced while orchestrating a search.
///
/// Modeled on `ResilienceError<E>`: a manual `Display`/`Error` impl rather
/// than a `thiserror` derive, since the derive macro can't infer the right
/// `where E: Display` bound for a bare type parameter that only appears in
/// one variant.
#[derive(Debug, Clone)]
pub enum SearchError<E = std::convert::Infallible> {
    /// The backend's circuit breaker rejected the call.
    CircuitOpen { backend: BackendId },

    /// A transient backend failure (timeout, connection reset, 5xx).
    BackendTransient { backend: BackendId, detail: String },

    /// The backend rate-limited this client.
    BackendRateLimit {
        backend: BackendId,
        retry_after: Option<Duration>,
    },

    /// The backend returned a captcha / access-denied response.
    BackendAntiBot { backend: BackendId },

    /// Query classification failed; callers should fall back to `General`.
    Classifier(String),

    /// Rank fusion failed.
    Fusion(String),

    /// Cache lookup or store failed.
    Cache(String),

    /// Metrics recording failed.
    Metrics(String),

    /// Every dispatched backend failed and the local index had nothing.
    OrchestratorFatal,

    /// An application-specific error from a caller-supplied component.
    Application(E),
}

impl<E: fmt::Display> fmt::Display for SearchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::CircuitOpen { backend } => write!(f, "circuit open for backend {backend}"),
            SearchError::BackendTransient { backend, detail } => {
                write!(f, "transient error from backend {backend}: {detail}")
            }
            SearchError::BackendRateLimit { backend, .. } => {
                write!(f, "rate limited by backend {backend}")
            }
            SearchError::BackendAntiBot { backend } => {
                write!(f, "anti-bot response from backend {backend}")
            }
            SearchError::Classifier(s) => write!(f, "classifier error: {s}"),
            SearchError::Fusion(s) => write!(f, "fusion error: {s}"),
            SearchError::Cache(s) => write!(f, "cache error: {s}"),
            SearchError::Metrics(s) => write!(f, "metrics error: {s}"),
            SearchError::OrchestratorFatal => {
                write!(f, "all backends failed and the local index returned no results")
            }
            SearchError::Application(e) => write!(f, "application error: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for SearchError<E> {}

impl<E> SearchError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, SearchError::CircuitOpen { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::BackendRateLimit { .. })
    }

    pub fn is_anti_bot(&self) -> bool {
        matches!(self, SearchError::BackendAntiBot { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::BackendTransient { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::OrchestratorFatal)
    }

    pub fn is_application(&self) -> bool {
        matches!(self, SearchError::Application(_))
    }

    pub fn application_error(self) -> Option<E> {
        match self {
            SearchError::Application(e) => Some(e),
            _ => None,
        }
    }

    pub fn map_application<F, T>(self, f: F) -> SearchError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            SearchError::CircuitOpen { backend } => SearchError::CircuitOpen { backend },
            SearchError::BackendTransient { backend, detail } => {
                SearchError::BackendTransient { backend, detail }
            }
            SearchError::BackendRateLimit {
                backend,
                retry_after,
            } => SearchError::BackendRateLimit {
                backend,
                retry_after,
            },
            SearchError::BackendAntiBot { backend } => SearchError::BackendAntiBot { backend },
            SearchError::Classifier(s) => SearchError::Classifier(s),
            SearchError::Fusion(s) => SearchError::Fusion(s),
            SearchError::Cache(s) => SearchError::Cache(s),
            SearchError::Metrics(s) => SearchError::Metrics(s),
            SearchError::OrchestratorFatal => SearchError::OrchestratorFatal,
            SearchError::Application(e) => SearchError::Application(f(e)),
        }
    }
}

// Manual `fmt::Debug`-friendly helper; `thiserror::Error` above already
// derives `Display`/`Error` but we keep this re-export point stable for
// callers matching the resilience-crate convention of a hand-documented
// error surface.
impl<E> SearchError<E> {
    pub fn backend(&self) -> Option<&BackendId> {
        match self {
            SearchError::CircuitOpen { backend }
            | SearchError::BackendTransient { backend, .. }
            | SearchError::BackendRateLimit { backend, .. }
            | SearchError::BackendAntiBot { backend } => Some(backend),
            _ => None,
        }
    }
}

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn _check() {
        assert_send_sync::<SearchError<std::convert::Infallible>>();
    }
};

impl<E: fmt::Debug> SearchError<E> {
    /// Whether this error should be logged-and-swallowed rather than
    /// surfaced to the orchestrator's caller, per the degrade-don't-fail
    /// discipline of the pipeline.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, SearchError::OrchestratorFatal | SearchError::Application(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_variants() {
        let err: SearchError<String> = SearchError::CircuitOpen {
            backend: BackendId::new("brave"),
        };
        assert!(err.is_circuit_open());
        assert!(err.is_degradable());
        assert_eq!(err.backend().unwrap().as_str(), "brave");
    }

    #[test]
    fn map_application_preserves_infra_variants() {
        let err: SearchError<&'static str> = SearchError::Classifier("bad regex".into());
        let mapped = err.map_application(|s| s.len());
        assert!(matches!(mapped, SearchError::Classifier(_)));
    }
}
