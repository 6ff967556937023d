//! C7: per-backend and per-query search quality metrics.
//!
//! Grounded on `search_metrics.py`'s `SearchMetrics`/`EngineMetrics`/
//! `QueryMetrics`: identical percentile/ratio formulas and the same
//! `estimated_mrr` approximation. The reference implementation records
//! both concerns from one flat list of per-engine result dicts; this
//! crate's pipeline already groups results by URL before metrics ever
//! see them ([`search_core::FusedResult::engine_count`] *is* the
//! multi-engine-agreement signal), so backend request outcomes and
//! query-level quality are recorded through two entry points instead of
//! one `record_search` call.

use search_core::{BackendId, FusedResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

const MAX_SAMPLES: usize = 100;

#[derive(Debug, Clone, Default)]
struct EngineMetrics {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_results: u64,
    response_times: VecDeque<Duration>,
}

impl EngineMetrics {
    fn record_request(&mut self, success: bool, result_count: usize, response_time: Duration) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
            self.total_results += result_count as u64;
        } else {
            self.failed_requests += 1;
        }
        self.response_times.push_back(response_time);
        while self.response_times.len() > MAX_SAMPLES {
            self.response_times.pop_front();
        }
    }

    fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    fn avg_results_per_request(&self) -> f64 {
        if self.successful_requests == 0 {
            0.0
        } else {
            self.total_results as f64 / self.successful_requests as f64
        }
    }

    fn p50_response_time(&self) -> Duration {
        if self.response_times.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<Duration> = self.response_times.iter().copied().collect();
        sorted.sort();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2
        } else {
            sorted[mid]
        }
    }

    fn p95_response_time(&self) -> Duration {
        if self.response_times.len() < 2 {
            return self.p50_response_time();
        }
        let mut sorted: Vec<Duration> = self.response_times.iter().copied().collect();
        sorted.sort();
        let idx = ((sorted.len() as f64) * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

#[derive(Debug, Clone, Default)]
struct QueryMetrics {
    total_queries: u64,
    queries_with_results: u64,
    total_results_returned: u64,
    total_unique_domains: u64,
    multi_engine_results: u64,
}

impl QueryMetrics {
    fn record_query(&mut self, result_count: usize, unique_domains: usize, multi_engine_count: usize) {
        self.total_queries += 1;
        if result_count > 0 {
            self.queries_with_results += 1;
        }
        self.total_results_returned += result_count as u64;
        self.total_unique_domains += unique_domains as u64;
        self.multi_engine_results += multi_engine_count as u64;
    }

    fn zero_result_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            1.0 - (self.queries_with_results as f64 / self.total_queries as f64)
        }
    }

    fn avg_results_per_query(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_results_returned as f64 / self.total_queries as f64
        }
    }

    fn avg_domain_diversity(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_unique_domains as f64 / self.total_queries as f64
        }
    }

    fn estimated_mrr(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            (self.multi_engine_results as f64 / (self.total_queries.max(1) as f64) * 2.0).min(1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySummary {
    pub total_queries: u64,
    pub zero_result_rate: f64,
    pub avg_results_per_query: f64,
    pub avg_domain_diversity: f64,
    pub estimated_mrr: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSummary {
    pub backend: BackendId,
    pub total_requests: u64,
    pub success_rate: f64,
    pub avg_results_per_request: f64,
    pub p50_ms: u128,
    pub p95_ms: u128,
}

pub struct MetricsRecorder {
    engines: Mutex<HashMap<BackendId, EngineMetrics>>,
    queries: Mutex<QueryMetrics>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            queries: Mutex::new(QueryMetrics::default()),
        }
    }

    pub async fn record_backend_request(
        &self,
        backend: &BackendId,
        success: bool,
        result_count: usize,
        response_time: Duration,
    ) {
        let mut engines = self.engines.lock().await;
        engines
            .entry(backend.clone())
            .or_default()
            .record_request(success, result_count, response_time);
    }

    /// Records one completed query's fused result set. Domain diversity
    /// is counted from each result's URL host; multi-engine agreement
    /// is read directly off `engine_count() > 1` since fusion has
    /// already grouped results by URL.
    pub async fn record_query(&self, results: &[FusedResult]) {
        let mut domains: HashSet<String> = HashSet::new();
        let mut multi_engine_count = 0usize;

        for result in results {
            if let Ok(parsed) = url::Url::parse(&result.url) {
                if let Some(host) = parsed.host_str() {
                    domains.insert(host.to_string());
                }
            }
            if result.engine_count() > 1 {
                multi_engine_count += 1;
            }
        }

        let mut queries = self.queries.lock().await;
        queries.record_query(results.len(), domains.len(), multi_engine_count);
    }

    pub async fn query_summary(&self) -> QuerySummary {
        let queries = self.queries.lock().await;
        QuerySummary {
            total_queries: queries.total_queries,
            zero_result_rate: queries.zero_result_rate(),
            avg_results_per_query: queries.avg_results_per_query(),
            avg_domain_diversity: queries.avg_domain_diversity(),
            estimated_mrr: queries.estimated_mrr(),
        }
    }

    pub async fn engine_summaries(&self) -> Vec<EngineSummary> {
        let engines = self.engines.lock().await;
        let mut summaries: Vec<EngineSummary> = engines
            .iter()
            .map(|(backend, m)| EngineSummary {
                backend: backend.clone(),
                total_requests: m.total_requests,
                success_rate: m.success_rate(),
                avg_results_per_request: m.avg_results_per_request(),
                p50_ms: m.p50_response_time().as_millis(),
                p95_ms: m.p95_response_time().as_millis(),
            })
            .collect();
        summaries.sort_by(|a, b| b.total_requests.cmp(&a.total_requests));
        summaries
    }

    /// Engines ranked by `success_rate * avg_results_per_request *
    /// (1 / max(0.1, p50_seconds))`, descending. Engines with fewer
    /// than 3 recorded requests are excluded — not enough data.
    pub async fn ranking(&self) -> Vec<(BackendId, f64)> {
        let engines = self.engines.lock().await;
        let mut scores: Vec<(BackendId, f64)> = engines
            .iter()
            .filter(|(_, m)| m.total_requests >= 3)
            .map(|(backend, m)| {
                let p50_secs = m.p50_response_time().as_secs_f64();
                let score = m.success_rate() * m.avg_results_per_request() * (1.0 / p50_secs.max(0.1));
                (backend.clone(), score)
            })
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::ResultSource;
    use std::collections::HashMap as StdHashMap;

    fn fused(url: &str, engines: Vec<&str>) -> FusedResult {
        FusedResult {
            url: url.into(),
            title: "t".into(),
            content: "c".into(),
            engines: engines.into_iter().map(BackendId::new).collect(),
            rrf_score: 0.0,
            weighted_score: 0.0,
            borda_score: 0.0,
            final_score: 0.0,
            original_scores: StdHashMap::new(),
            original_ranks: StdHashMap::new(),
            metadata: StdHashMap::new(),
            source: ResultSource::Backend,
        }
    }

    #[tokio::test]
    async fn zero_result_rate_and_mrr_track_across_queries() {
        let metrics = MetricsRecorder::new();
        metrics
            .record_query(&[fused("https://a.example", vec!["brave", "bing"]), fused("https://b.example", vec!["brave"])])
            .await;
        metrics.record_query(&[]).await;

        let summary = metrics.query_summary().await;
        assert_eq!(summary.total_queries, 2);
        assert!((summary.zero_result_rate - 0.5).abs() < 1e-9);
        // multi_engine_results=1, total_queries=2 -> min(1.0, 1/2*2) = 1.0
        assert!((summary.estimated_mrr - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ranking_excludes_backends_with_fewer_than_three_requests() {
        let metrics = MetricsRecorder::new();
        metrics
            .record_backend_request(&BackendId::new("brave"), true, 5, Duration::from_millis(100))
            .await;
        metrics
            .record_backend_request(&BackendId::new("brave"), true, 5, Duration::from_millis(100))
            .await;

        assert!(metrics.ranking().await.is_empty());

        metrics
            .record_backend_request(&BackendId::new("brave"), true, 5, Duration::from_millis(100))
            .await;
        assert_eq!(metrics.ranking().await.len(), 1);
    }

    #[tokio::test]
    async fn response_time_samples_are_capped_at_max_samples() {
        let metrics = MetricsRecorder::new();
        for _ in 0..150 {
            metrics
                .record_backend_request(&BackendId::new("brave"), true, 1, Duration::from_millis(50))
                .await;
        }
        let summaries = metrics.engine_summaries().await;
        assert_eq!(summaries[0].total_requests, 150);
    }
}
