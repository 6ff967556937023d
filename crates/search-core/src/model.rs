//! Data model shared across the search orchestration components.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A search query in both its normalized and as-typed forms.
#[derive(Debug, Clone)]
pub struct Query {
    /// As the caller typed it.
    pub raw: String,
    /// Lowercased and trimmed, used for classification and fingerprinting.
    pub text: String,
}

impl Query {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = raw.trim().to_lowercase();
        Self { raw, text }
    }
}

/// Identifies a backend search engine or data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(pub String);

impl BackendId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topical classification assigned to a query by the classifier.
///
/// Declaration order is load-bearing: it is the tie-break order used when
/// two categories score equally during single-route classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Academic,
    Technical,
    Code,
    Troubleshooting,
    Industrial,
    Medical,
    News,
    General,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Academic,
        Category::Technical,
        Category::Code,
        Category::Troubleshooting,
        Category::Industrial,
        Category::Medical,
        Category::News,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academic => "academic",
            Category::Technical => "technical",
            Category::Code => "code",
            Category::Troubleshooting => "troubleshooting",
            Category::Industrial => "industrial",
            Category::Medical => "medical",
            Category::News => "news",
            Category::General => "general",
        }
    }
}

/// One engine's unprocessed hit.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub backend: BackendId,
    pub score: f64,
    pub category: String,
    pub thumbnail: Option<String>,
    pub published_date: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Where a [`FusedResult`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Backend,
    Local,
}

/// A result after cross-backend grouping and score fusion.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub engines: Vec<BackendId>,
    pub rrf_score: f64,
    pub weighted_score: f64,
    pub borda_score: f64,
    pub final_score: f64,
    pub original_scores: HashMap<BackendId, f64>,
    pub original_ranks: HashMap<BackendId, usize>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub source: ResultSource,
}

impl FusedResult {
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }
}

/// SHA-256 fingerprint of a normalized query plus its backend set,
/// matching `_hash_query` in the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn compute(normalized_query: &str, backends: &[BackendId]) -> Self {
        let mut sorted: Vec<&str> = backends.iter().map(|b| b.as_str()).collect();
        sorted.sort_unstable();
        let joined = sorted.join(",");
        let mut hasher = Sha256::new();
        hasher.update(normalized_query.as_bytes());
        hasher.update(b"|");
        hasher.update(joined.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Fingerprint(bytes)
    }
}

/// Which cache tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    L1,
    L2,
    Miss,
}

/// A cached search result set.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub query: String,
    pub fingerprint: Fingerprint,
    pub results: Vec<FusedResult>,
    pub engines: Vec<BackendId>,
    pub created_at: Instant,
    pub ttl: Duration,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// `Closed | Open | HalfOpen` circuit state for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Throttler-maintained health record for one backend.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    pub backend: BackendId,
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub state: CircuitState,
    pub current_backoff: Duration,
    pub total_requests: u64,
    pub total_failures: u64,
}

impl BackendHealth {
    pub fn new(backend: BackendId) -> Self {
        Self {
            backend,
            consecutive_failures: 0,
            last_failure: None,
            last_success: None,
            state: CircuitState::Closed,
            current_backoff: Duration::ZERO,
            total_requests: 0,
            total_failures: 0,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_requests as f64
        }
    }
}

/// A user-engagement signal for feedback learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSignal {
    Click,
    Dwell,
    Reformulate,
    NoClick,
    Helpful,
    NotHelpful,
}

/// One recorded engagement event.
#[derive(Debug, Clone)]
pub struct EngagementRecord {
    pub backend: BackendId,
    pub category: Category,
    pub signal: FeedbackSignal,
    pub position: usize,
    pub dwell_ms: Option<u64>,
    pub session_id: Option<String>,
}
