//! Shared types, error taxonomy, and event system for the search
//! orchestration engine.
//!
//! This crate plays the same role for the `search-*` crates that
//! `tower-resilience-core` plays for the resilience patterns it was
//! grounded on: a dependency-free (beyond stdlib + serde) home for the
//! data model every other component shares, plus a unified error enum
//! and a panic-safe event/listener system.

mod error;
mod events;
mod model;

pub use error::SearchError;
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, SearchEvent};
pub use model::{
    BackendHealth, BackendId, CacheEntry, CacheTier, Category, CircuitState, EngagementRecord,
    FeedbackSignal, Fingerprint, FusedResult, Query, RawResult, ResultSource,
};
