//! C6: cross-encoder reranking of fused results.
//!
//! Grounded on `cross_encoder_rerank.py`'s `CrossEncoderReranker`: same
//! batch/top_k/max_length limits, same min-max score normalization with
//! a zero-range guard, same `0.7*normalized_ce + 0.3*rank_score` hybrid
//! blend, and the same degraded path when no model is available —
//! input order unchanged, synthetic descending scores, `applied =
//! false`. Never an error.

use async_trait::async_trait;
use search_core::FusedResult;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct RerankConfig {
    pub batch_size: usize,
    pub max_length: usize,
    pub top_k: usize,
    pub score_weight: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_length: 512,
            top_k: 20,
            score_weight: 0.7,
        }
    }
}

/// A cross-encoder model. Production deployments back this with a real
/// scoring model (e.g. an MS MARCO MiniLM checkpoint served locally or
/// over gRPC); its absence degrades gracefully rather than erroring.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Attempts to load the model, returning whether it's usable.
    /// Called at most once per [`Reranker`] thanks to single-flight
    /// initialization.
    async fn load(&self) -> bool;

    /// Scores `(query, document)` pairs. Only called after a
    /// successful [`load`](Self::load).
    async fn score_batch(&self, query: &str, documents: &[String], batch_size: usize) -> Vec<f64>;
}

/// Default encoder: always reports unavailable, so `rerank` always
/// takes the degraded path.
pub struct NullCrossEncoder;

#[async_trait]
impl CrossEncoder for NullCrossEncoder {
    async fn load(&self) -> bool {
        false
    }

    async fn score_batch(&self, _query: &str, _documents: &[String], _batch_size: usize) -> Vec<f64> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct RerankedResult {
    pub result: FusedResult,
    pub cross_encoder_score: f64,
    pub original_rank: usize,
    pub final_score: f64,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub results: Vec<RerankedResult>,
    pub applied: bool,
}

pub struct Reranker {
    config: RerankConfig,
    encoder: std::sync::Arc<dyn CrossEncoder>,
    loaded: OnceCell<bool>,
}

impl Reranker {
    pub fn new(config: RerankConfig, encoder: std::sync::Arc<dyn CrossEncoder>) -> Self {
        Self {
            config,
            encoder,
            loaded: OnceCell::new(),
        }
    }

    pub fn unavailable(config: RerankConfig) -> Self {
        Self::new(config, std::sync::Arc::new(NullCrossEncoder))
    }

    /// Single-flight model load: concurrent callers await the same
    /// in-flight attempt instead of racing to load independently.
    async fn ensure_loaded(&self) -> bool {
        *self.loaded.get_or_init(|| self.encoder.load()).await
    }

    pub async fn rerank(&self, query: &str, results: Vec<FusedResult>) -> RerankOutcome {
        let truncated: Vec<FusedResult> = results.into_iter().take(self.config.top_k).collect();

        if !self.ensure_loaded().await {
            return degraded(truncated);
        }

        let documents: Vec<String> = truncated.iter().map(document_text).collect();
        let scores = self.encoder.score_batch(query, &documents, self.config.batch_size).await;
        if scores.len() != truncated.len() {
            return degraded(truncated);
        }

        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = if (max - min).abs() < f64::EPSILON { 1.0 } else { max - min };

        let mut reranked: Vec<RerankedResult> = truncated
            .into_iter()
            .zip(scores)
            .enumerate()
            .map(|(i, (result, ce_score))| {
                let normalized = (ce_score - min) / range;
                let rank_score = 1.0 - (i as f64 * 0.05);
                let final_score = self.config.score_weight * normalized + (1.0 - self.config.score_weight) * rank_score;
                RerankedResult {
                    result,
                    cross_encoder_score: ce_score,
                    original_rank: i,
                    final_score,
                }
            })
            .collect();

        reranked.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());
        RerankOutcome { results: reranked, applied: true }
    }
}

fn document_text(result: &FusedResult) -> String {
    if !result.title.is_empty() && !result.content.contains(&result.title) {
        format!("{}. {}", result.title, result.content)
    } else {
        result.content.clone()
    }
}

fn degraded(results: Vec<FusedResult>) -> RerankOutcome {
    let reranked = results
        .into_iter()
        .enumerate()
        .map(|(i, result)| RerankedResult {
            cross_encoder_score: 0.0,
            original_rank: i,
            final_score: 1.0 - (i as f64 * 0.01),
            result,
        })
        .collect();
    RerankOutcome { results: reranked, applied: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::ResultSource;
    use std::collections::HashMap;

    fn fused(url: &str, title: &str) -> FusedResult {
        FusedResult {
            url: url.into(),
            title: title.into(),
            content: "some content body".into(),
            engines: vec![],
            rrf_score: 0.0,
            weighted_score: 0.0,
            borda_score: 0.0,
            final_score: 0.0,
            original_scores: HashMap::new(),
            original_ranks: HashMap::new(),
            metadata: HashMap::new(),
            source: ResultSource::Backend,
        }
    }

    struct FixedScores(Vec<f64>);

    #[async_trait]
    impl CrossEncoder for FixedScores {
        async fn load(&self) -> bool {
            true
        }
        async fn score_batch(&self, _query: &str, documents: &[String], _batch_size: usize) -> Vec<f64> {
            self.0[..documents.len()].to_vec()
        }
    }

    /// S6: an unavailable cross-encoder leaves input order unchanged
    /// with synthetic descending scores and `applied = false`.
    #[tokio::test]
    async fn s6_degraded_path_preserves_order_with_synthetic_scores() {
        let reranker = Reranker::unavailable(RerankConfig::default());
        let results = vec![fused("https://a", "A"), fused("https://b", "B"), fused("https://c", "C")];

        let outcome = reranker.rerank("query", results).await;

        assert!(!outcome.applied);
        assert_eq!(outcome.results[0].result.url, "https://a");
        assert_eq!(outcome.results[1].result.url, "https://b");
        assert_eq!(outcome.results[2].result.url, "https://c");
        assert!((outcome.results[0].final_score - 1.0).abs() < 1e-9);
        assert!((outcome.results[1].final_score - 0.99).abs() < 1e-9);
        assert!((outcome.results[2].final_score - 0.98).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_range_scores_normalize_without_dividing_by_zero() {
        let encoder = std::sync::Arc::new(FixedScores(vec![0.5, 0.5, 0.5]));
        let reranker = Reranker::new(RerankConfig::default(), encoder);
        let results = vec![fused("https://a", "A"), fused("https://b", "B"), fused("https://c", "C")];

        let outcome = reranker.rerank("query", results).await;
        assert!(outcome.applied);
        for r in &outcome.results {
            assert!(r.cross_encoder_score.is_finite());
        }
    }

    #[tokio::test]
    async fn higher_cross_encoder_score_can_overcome_a_worse_original_rank() {
        let encoder = std::sync::Arc::new(FixedScores(vec![0.1, 0.9]));
        let reranker = Reranker::new(RerankConfig::default(), encoder);
        let results = vec![fused("https://first", "First"), fused("https://second", "Second")];

        let outcome = reranker.rerank("query", results).await;
        assert_eq!(outcome.results[0].result.url, "https://second");
    }
}
