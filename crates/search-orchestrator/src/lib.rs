//! C9: the pipeline orchestrator. Ties the classifier (C2), cache (C3),
//! backend adapter (C10) + throttler (C1), local index (C4), fusion
//! (C5), reranker (C6), metrics (C7), and feedback learner (C8) into the
//! single `search` entry point, plus the two auxiliary entry points
//! `search_multi_query` and `search_with_fallback`.
//!
//! Grounded on `searxng_client.py`'s `SearXNGClient`, the one reference
//! class that composes a throttler and a TLS rotator internally and
//! exposes `search`/`search_multi_query`/`search_with_fallback` as
//! distinct methods on itself — the same shape this crate's
//! `SearchOrchestrator` takes, generalized to compose every component
//! instead of just the HTTP client and throttler.

mod config;

pub use config::OrchestratorConfig;

use search_backend::{SearchOptions, SearxngAdapter};
use search_cache::{CacheConfig, TwoTierCache};
use search_classifier::QueryClassifier;
use search_core::{
    BackendId, CacheTier, Category, EngagementRecord, FeedbackSignal, FusedResult, Query, RawResult, ResultSource,
    SearchError,
};
use search_feedback::{FeedbackConfig, FeedbackLearner};
use search_fusion::FusionMethod;
use search_index::{IndexConfig, LocalDocIndexer};
use search_metrics::MetricsRecorder;
use search_rerank::{RerankConfig, Reranker};
use search_throttle::{FailureKind, ThrottleConfig, Throttler};
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::time::{Duration, Instant};

/// Per-stage diagnostics returned alongside a search's results: routing
/// category, which cache tier (if any) served the request, the fusion
/// method applied, whether reranking actually ran, which backends were
/// dispatched, and the pipeline's total wall time.
#[derive(Debug, Clone)]
pub struct SearchDiagnostics {
    pub routing: Category,
    pub cache_tier: CacheTier,
    pub fusion_method: FusionMethod,
    pub reranking_applied: bool,
    pub backends_used: Vec<BackendId>,
    pub total_wall_time: Duration,
}

/// A completed search: the final results plus the diagnostics payload
/// the pipeline recorded while producing them.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<FusedResult>,
    pub diagnostics: SearchDiagnostics,
}

pub struct SearchOrchestrator {
    config: OrchestratorConfig,
    classifier: QueryClassifier,
    throttler: Throttler,
    adapter: SearxngAdapter,
    cache: TwoTierCache,
    local_index: LocalDocIndexer,
    reranker: Reranker,
    metrics: MetricsRecorder,
    feedback: FeedbackLearner,
}

impl SearchOrchestrator {
    /// Builds an orchestrator against a single SearXNG-style endpoint,
    /// with the capability traits (cache L2, local index, reranker) in
    /// their no-op/in-memory forms — the same "just works, degraded"
    /// posture the reference implementation falls back to when its
    /// optional dependencies aren't installed.
    pub fn new(backend_base_url: impl Into<String>) -> Self {
        Self::with_config(backend_base_url, OrchestratorConfig::default())
    }

    pub fn with_config(backend_base_url: impl Into<String>, config: OrchestratorConfig) -> Self {
        Self {
            config,
            classifier: QueryClassifier::new(),
            throttler: Throttler::new(ThrottleConfig::default()),
            adapter: SearxngAdapter::new(backend_base_url),
            cache: TwoTierCache::in_memory(CacheConfig::default()),
            local_index: LocalDocIndexer::in_memory(IndexConfig::default()),
            reranker: Reranker::unavailable(RerankConfig::default()),
            metrics: MetricsRecorder::new(),
            feedback: FeedbackLearner::new(FeedbackConfig::default()),
        }
    }

    /// Full dependency-injected constructor, for swapping in a
    /// Meilisearch-backed local index, a loaded cross-encoder, or a
    /// semantic cache with a real embedding provider.
    pub fn from_parts(
        config: OrchestratorConfig,
        classifier: QueryClassifier,
        throttler: Throttler,
        adapter: SearxngAdapter,
        cache: TwoTierCache,
        local_index: LocalDocIndexer,
        reranker: Reranker,
        metrics: MetricsRecorder,
        feedback: FeedbackLearner,
    ) -> Self {
        Self {
            config,
            classifier,
            throttler,
            adapter,
            cache,
            local_index,
            reranker,
            metrics,
            feedback,
        }
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn feedback(&self) -> &FeedbackLearner {
        &self.feedback
    }

    /// The full eight-step pipeline: classify, probe the cache,
    /// dispatch to backends, fuse, blend in local-index hits, rerank,
    /// cache the fresh result, and record metrics/impressions. Returns
    /// `OrchestratorFatal` when every selected backend failed, the cache
    /// missed, and the local index had nothing either — the one case a
    /// plain empty `Vec` would be indistinguishable from a genuine
    /// zero-result query.
    pub async fn search(
        &self,
        raw_query: &str,
        explicit_backends: Option<Vec<BackendId>>,
    ) -> Result<SearchOutcome, SearchError<Infallible>> {
        let start = Instant::now();
        let query = Query::new(raw_query);
        let category = self.classifier.route(&query).category;
        let backends = explicit_backends.unwrap_or_else(|| self.classifier.combined_engines(&query));

        let (cached, cache_tier) = self.cache.get(&query.text, &backends).await;
        let (mut results, reranking_applied) = if let Some(entry) = cached {
            (entry.results, false)
        } else {
            let fused = self.dispatch_and_fuse(&backends, &query.text, category).await;
            let merged = self.blend_local(&query.text, fused).await;
            if merged.is_empty() {
                return Err(SearchError::OrchestratorFatal);
            }

            let reranked = self.reranker.rerank(&query.text, merged).await;
            let applied = reranked.applied;
            let mut final_results: Vec<FusedResult> = reranked.results.into_iter().map(|r| r.result).collect();
            final_results.truncate(self.config.top_k);

            self.cache.put(&query.text, &backends, final_results.clone()).await;
            (final_results, applied)
        };

        results.truncate(self.config.top_k);
        self.metrics.record_query(&results).await;
        self.feedback.record_impression(category, &results).await;

        Ok(SearchOutcome {
            results,
            diagnostics: SearchDiagnostics {
                routing: category,
                cache_tier,
                fusion_method: self.config.fusion_method,
                reranking_applied,
                backends_used: backends,
                total_wall_time: start.elapsed(),
            },
        })
    }

    /// Forwards a click engagement signal to C8; does not re-run the
    /// pipeline. `url` isn't part of the learned engagement model (the
    /// reference implementation's `EnginePerformance` is keyed purely by
    /// `(backend, category)`), but is accepted here so callers logging a
    /// raw click event don't need to discard it themselves.
    pub async fn click(
        &self,
        backend: BackendId,
        category: Category,
        _url: &str,
        position: usize,
        session: Option<String>,
    ) {
        self.feedback
            .record_feedback(EngagementRecord {
                backend,
                category,
                signal: FeedbackSignal::Click,
                position,
                dwell_ms: None,
                session_id: session,
            })
            .await;
    }

    /// Thin fan-out utility: dispatches each query to `engines`
    /// concurrently, keeps up to `max_per_query` hits per query (highest
    /// score first), and concatenates across queries deduped by
    /// normalized URL in first-seen order. Does not classify, cache, or
    /// rerank.
    pub async fn search_multi_query(
        &self,
        queries: &[String],
        engines: &[BackendId],
        max_per_query: usize,
    ) -> Vec<RawResult> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for query in queries {
            let by_backend = self.dispatch(engines, query).await;
            let mut combined: Vec<RawResult> = by_backend.into_values().flatten().collect();
            combined.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            combined.truncate(max_per_query);

            for result in combined {
                if seen.insert(search_fusion::normalize_url(&result.url)) {
                    out.push(result);
                }
            }
        }

        out
    }

    /// Runs the full pipeline against `primary`; if fusion yields fewer
    /// than `min_results` candidates, dispatches `fallback` too and
    /// merges its fused results in (deduped by normalized URL) before
    /// local-index blending and reranking. Bypasses the cache, since the
    /// fallback decision depends on a live candidate count. Shares
    /// `search`'s `OrchestratorFatal` signaling: if primary and fallback
    /// both come back empty and the local index has nothing, that's not
    /// a genuine zero-result query.
    pub async fn search_with_fallback(
        &self,
        raw_query: &str,
        primary: &[BackendId],
        fallback: &[BackendId],
        min_results: usize,
    ) -> Result<SearchOutcome, SearchError<Infallible>> {
        let start = Instant::now();
        let query = Query::new(raw_query);
        let category = self.classifier.route(&query).category;

        let mut fused = self.dispatch_and_fuse(primary, &query.text, category).await;
        let mut backends_used = primary.to_vec();

        if fused.len() < min_results && !fallback.is_empty() {
            let fallback_fused = self.dispatch_and_fuse(fallback, &query.text, category).await;
            let mut seen: HashSet<String> = fused.iter().map(|r| search_fusion::normalize_url(&r.url)).collect();
            for result in fallback_fused {
                if seen.insert(search_fusion::normalize_url(&result.url)) {
                    fused.push(result);
                }
            }
            backends_used.extend(fallback.iter().cloned());
        }

        let merged = self.blend_local(&query.text, fused).await;
        if merged.is_empty() {
            return Err(SearchError::OrchestratorFatal);
        }

        let reranked = self.reranker.rerank(&query.text, merged).await;
        let reranking_applied = reranked.applied;
        let mut final_results: Vec<FusedResult> = reranked.results.into_iter().map(|r| r.result).collect();
        final_results.truncate(self.config.top_k);

        self.metrics.record_query(&final_results).await;
        self.feedback.record_impression(category, &final_results).await;

        Ok(SearchOutcome {
            results: final_results,
            diagnostics: SearchDiagnostics {
                routing: category,
                cache_tier: CacheTier::Miss,
                fusion_method: self.config.fusion_method,
                reranking_applied,
                backends_used,
                total_wall_time: start.elapsed(),
            },
        })
    }

    async fn dispatch_and_fuse(&self, backends: &[BackendId], query_text: &str, category: Category) -> Vec<FusedResult> {
        let raw_by_backend = self.dispatch(backends, query_text).await;
        let weights = self.weight_map(backends, category).await;
        search_fusion::fuse(&raw_by_backend, self.config.fusion_method, self.config.top_k * 2, move |b: &BackendId| {
            *weights.get(b).unwrap_or(&1.0)
        })
    }

    /// Concurrent per-backend dispatch, each call paced/circuit-broken
    /// by C1. A `CircuitOpen` (or any other) failure drops that backend
    /// from the result map rather than failing the whole search.
    async fn dispatch(&self, backends: &[BackendId], query: &str) -> HashMap<BackendId, Vec<RawResult>> {
        let tasks = backends.iter().cloned().map(|backend| self.dispatch_one(backend, query));
        futures::future::join_all(tasks).await.into_iter().flatten().collect()
    }

    async fn dispatch_one(&self, backend: BackendId, query: &str) -> Option<(BackendId, Vec<RawResult>)> {
        let start = Instant::now();

        if self.throttler.acquire(&backend).await.is_err() {
            return None;
        }

        let options = SearchOptions {
            engines: Some(vec![backend.clone()]),
            ..Default::default()
        };

        match self.adapter.search(query, &options).await {
            Ok(results) => {
                self.throttler.record_success(&backend).await;
                self.metrics.record_backend_request(&backend, true, results.len(), start.elapsed()).await;
                Some((backend, results))
            }
            Err(err) => {
                let kind = if err.is_rate_limited() {
                    FailureKind::RateLimit
                } else if err.is_anti_bot() {
                    FailureKind::AntiBot
                } else {
                    FailureKind::Transient
                };
                self.throttler.record_failure(&backend, kind).await;
                self.metrics.record_backend_request(&backend, false, 0, start.elapsed()).await;
                None
            }
        }
    }

    async fn weight_map(&self, backends: &[BackendId], category: Category) -> HashMap<BackendId, f64> {
        let mut map = HashMap::with_capacity(backends.len());
        for backend in backends {
            let weight = search_fusion::default_weight(backend) * self.feedback.weight(backend, category).await;
            map.insert(backend.clone(), weight);
        }
        map
    }

    /// Queries the local index (C4) and merges its hits into `fused`,
    /// boosted and tagged per the pipeline's step 5/6.
    async fn blend_local(&self, query_text: &str, fused: Vec<FusedResult>) -> Vec<FusedResult> {
        let local_raw = self.local_index.search(query_text, self.config.local_index_limit, None).await;
        let local_fused: Vec<FusedResult> = local_raw
            .into_iter()
            .map(|r| local_to_fused(r, self.config.local_boost))
            .collect();
        merge_and_sort(fused, local_fused)
    }
}

fn local_to_fused(raw: RawResult, boost: f64) -> FusedResult {
    let backend = raw.backend.clone();
    let mut original_scores = HashMap::new();
    original_scores.insert(backend.clone(), raw.score);
    let mut original_ranks = HashMap::new();
    original_ranks.insert(backend.clone(), 1);

    FusedResult {
        url: raw.url,
        title: raw.title,
        content: raw.content,
        engines: vec![backend],
        rrf_score: 0.0,
        weighted_score: 0.0,
        borda_score: 0.0,
        final_score: raw.score + boost,
        original_scores,
        original_ranks,
        metadata: raw.metadata,
        source: ResultSource::Local,
    }
}

fn merge_and_sort(mut fused: Vec<FusedResult>, mut local: Vec<FusedResult>) -> Vec<FusedResult> {
    fused.append(&mut local);
    fused.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_fused(url: &str, score: f64, engines: Vec<&str>) -> FusedResult {
        FusedResult {
            url: url.to_string(),
            title: "t".into(),
            content: "c".into(),
            engines: engines.into_iter().map(BackendId::new).collect(),
            rrf_score: 0.0,
            weighted_score: 0.0,
            borda_score: 0.0,
            final_score: score,
            original_scores: HashMap::new(),
            original_ranks: HashMap::new(),
            metadata: HashMap::new(),
            source: ResultSource::Backend,
        }
    }

    fn local_raw(url: &str, score: f64) -> RawResult {
        RawResult {
            title: "doc".into(),
            url: url.to_string(),
            content: "local content".into(),
            backend: BackendId::new("local_docs"),
            score,
            category: "files".into(),
            thumbnail: None,
            published_date: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn local_to_fused_applies_boost_and_tags_source() {
        let raw = local_raw("https://a.example", 0.3);
        let fused = local_to_fused(raw, 0.5);
        assert!((fused.final_score - 0.8).abs() < 1e-9);
        assert_eq!(fused.source, ResultSource::Local);
        assert_eq!(fused.engines, vec![BackendId::new("local_docs")]);
    }

    #[test]
    fn merge_and_sort_orders_backend_and_local_results_by_score() {
        let backend_results = vec![empty_fused("https://a.example", 0.4, vec!["brave"])];
        let local_results = vec![empty_fused("https://b.example", 0.9, vec!["local_docs"])];
        let merged = merge_and_sort(backend_results, local_results);
        assert_eq!(merged[0].url, "https://b.example");
        assert_eq!(merged[1].url, "https://a.example");
    }

    #[tokio::test]
    async fn a_cache_hit_skips_dispatch_and_still_records_metrics_and_impressions() {
        let orchestrator = SearchOrchestrator::new("http://127.0.0.1:1");
        let backend = BackendId::new("brave");
        let query = Query::new("FANUC SRVO-063 fault");

        let cached_results = vec![empty_fused("https://fanuc.example/srvo-063", 1.2, vec!["brave"])];
        orchestrator.cache.put(&query.text, &[backend.clone()], cached_results.clone()).await;

        let outcome = orchestrator.search(&query.raw, Some(vec![backend])).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].url, cached_results[0].url);
        assert_eq!(outcome.diagnostics.cache_tier, CacheTier::L1);
        assert!(!outcome.diagnostics.reranking_applied);

        let summary = orchestrator.metrics.query_summary().await;
        assert_eq!(summary.total_queries, 1);
    }

    #[tokio::test]
    async fn search_reports_orchestrator_fatal_when_everything_comes_back_empty() {
        let orchestrator = SearchOrchestrator::new("http://127.0.0.1:1");
        let backend = BackendId::new("brave");

        let err = orchestrator.search("no backend reachable", Some(vec![backend])).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn click_records_an_engagement_signal_without_touching_the_network() {
        let orchestrator = SearchOrchestrator::new("http://127.0.0.1:1");
        let backend = BackendId::new("brave");

        orchestrator
            .click(backend.clone(), Category::Industrial, "https://fanuc.example", 2, Some("session-1".into()))
            .await;

        // min_samples (10) hasn't been reached via impressions, so the
        // learned weight stays neutral even though a click was recorded.
        let weight = orchestrator.feedback.weight(&backend, Category::Industrial).await;
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn default_config_fuses_to_twice_top_k() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.top_k * 2, 20);
    }

    #[tokio::test]
    async fn dispatch_and_fuse_with_no_backends_yields_no_candidates() {
        let orchestrator = SearchOrchestrator::new("http://127.0.0.1:1");
        let fused = orchestrator.dispatch_and_fuse(&[], "test query", Category::General).await;
        assert!(fused.is_empty());
    }
}
