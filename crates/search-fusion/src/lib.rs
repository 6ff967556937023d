//! C5: URL normalization, cross-backend grouping, and rank fusion.
//!
//! Grounded on `result_fusion.py`'s `ResultFusion.fuse` and its three
//! scoring formulas (RRF, Weighted, Borda) plus their 0.6/0.4 hybrid
//! blend.

use search_core::{BackendId, FusedResult, RawResult, ResultSource};
use std::collections::HashMap;

pub const RRF_K: f64 = 60.0;
pub const BORDA_MAX_RANK: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMethod {
    Rrf,
    Weighted,
    Borda,
    Hybrid,
}

/// Per-backend weight table, ported from `ResultFusion.DEFAULT_WEIGHTS`.
pub fn default_weight(backend: &BackendId) -> f64 {
    match backend.as_str() {
        "brave" => 1.5,
        "bing" => 1.2,
        "mojeek" => 1.1,
        "reddit" => 1.2,
        "wikipedia" => 1.0,
        "arxiv" => 1.3,
        "semantic_scholar" => 1.2,
        "openalex" => 1.2,
        "stackoverflow" => 1.1,
        "github" => 1.0,
        "pubmed" => 1.2,
        "crossref" => 1.0,
        _ => 1.0,
    }
}

/// Lowercase, strip a trailing slash, strip `http(s)://` then `www.`.
pub fn normalize_url(url: &str) -> String {
    let mut s = url.to_lowercase();
    if let Some(stripped) = s.strip_prefix("https://") {
        s = stripped.to_string();
    } else if let Some(stripped) = s.strip_prefix("http://") {
        s = stripped.to_string();
    }
    if let Some(stripped) = s.strip_prefix("www.") {
        s = stripped.to_string();
    }
    if s.ends_with('/') {
        s.pop();
    }
    s
}

struct Group {
    original_url: String,
    title: String,
    content: String,
    metadata: HashMap<String, serde_json::Value>,
    ranks: HashMap<BackendId, usize>,
    scores: HashMap<BackendId, f64>,
}

pub fn fuse(
    results_by_backend: &HashMap<BackendId, Vec<RawResult>>,
    method: FusionMethod,
    top_k: usize,
    weight_of: impl Fn(&BackendId) -> f64,
) -> Vec<FusedResult> {
    let mut groups: HashMap<String, Group> = HashMap::new();

    for (backend, results) in results_by_backend {
        for (rank0, result) in results.iter().enumerate() {
            let rank = rank0 + 1;
            let key = normalize_url(&result.url);
            let entry = groups.entry(key).or_insert_with(|| Group {
                original_url: result.url.clone(),
                title: result.title.clone(),
                content: result.content.clone(),
                metadata: result.metadata.clone(),
                ranks: HashMap::new(),
                scores: HashMap::new(),
            });

            if result.title.len() > entry.title.len() {
                entry.title = result.title.clone();
            }
            if result.content.len() > entry.content.len() {
                entry.content = result.content.clone();
            }
            entry.ranks.insert(backend.clone(), rank);
            entry.scores.insert(backend.clone(), result.score);
        }
    }

    let mut fused: Vec<FusedResult> = groups
        .into_values()
        .map(|group| {
            let engine_count = group.ranks.len();
            let total_weight: f64 = group.ranks.keys().map(|b| weight_of(b)).sum();

            let rrf_score: f64 = group
                .ranks
                .iter()
                .map(|(b, rank)| weight_of(b) / (RRF_K + *rank as f64))
                .sum();

            let weighted_sum: f64 = group
                .ranks
                .keys()
                .map(|b| weight_of(b) * group.scores.get(b).copied().unwrap_or(0.0))
                .sum();
            let weighted_score = if total_weight > 0.0 {
                weighted_sum / total_weight + 0.1 * (engine_count as f64 - 1.0)
            } else {
                0.0
            };

            let borda_sum: f64 = group
                .ranks
                .iter()
                .map(|(b, rank)| weight_of(b) * (BORDA_MAX_RANK - *rank as f64 + 1.0))
                .sum();
            let borda_score = borda_sum / (engine_count as f64 * BORDA_MAX_RANK);

            let final_score = match method {
                FusionMethod::Rrf => rrf_score,
                FusionMethod::Weighted => weighted_score,
                FusionMethod::Borda => borda_score,
                FusionMethod::Hybrid => 0.6 * rrf_score + 0.4 * weighted_score,
            };

            let mut engines: Vec<BackendId> = group.ranks.keys().cloned().collect();
            engines.sort();

            FusedResult {
                url: group.original_url,
                title: group.title,
                content: group.content,
                engines,
                rrf_score,
                weighted_score,
                borda_score,
                final_score,
                original_scores: group.scores,
                original_ranks: group.ranks,
                metadata: group.metadata,
                source: ResultSource::Backend,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap()
            .then_with(|| b.engine_count().cmp(&a.engine_count()))
            .then_with(|| normalize_url(&a.url).cmp(&normalize_url(&b.url)))
    });
    fused.truncate(top_k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::RawResult;

    fn raw(url: &str, score: f64) -> RawResult {
        RawResult {
            title: "t".into(),
            url: url.into(),
            content: "c".into(),
            backend: BackendId::new("x"),
            score,
            category: "general".into(),
            thumbnail: None,
            published_date: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn url_normalization_strips_scheme_www_and_trailing_slash() {
        assert_eq!(
            normalize_url("HTTPS://WWW.Example.com/path/"),
            "example.com/path"
        );
        assert_eq!(normalize_url("http://example.com"), "example.com");
    }

    /// Scenario S1: u1 at rank1 (engine X) and rank2 (engine Y); u2 at
    /// rank2 (X) and rank1 (Y); u3 only at rank3 (X). All weights 1.0.
    #[test]
    fn s1_rrf_scores_match_literal_scenario() {
        let mut by_backend = HashMap::new();
        by_backend.insert(
            BackendId::new("x"),
            vec![raw("https://a.example/u1", 1.0), raw("https://a.example/u2", 0.9), raw("https://a.example/u3", 0.8)],
        );
        by_backend.insert(
            BackendId::new("y"),
            vec![raw("https://a.example/u2", 1.0), raw("https://a.example/u1", 0.9)],
        );

        let fused = fuse(&by_backend, FusionMethod::Rrf, 10, |_| 1.0);
        let score_of = |url: &str| {
            fused
                .iter()
                .find(|r| r.url.contains(url))
                .unwrap()
                .rrf_score
        };

        let u1 = score_of("u1");
        let u2 = score_of("u2");
        let u3 = score_of("u3");

        assert!((u1 - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-9);
        assert!((u2 - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-9);
        assert!((u3 - (1.0 / 63.0)).abs() < 1e-9);
        assert!((u1 - u2).abs() < 1e-9);
    }

    #[test]
    fn fusion_output_is_sorted_descending_by_final_score() {
        let mut by_backend = HashMap::new();
        by_backend.insert(
            BackendId::new("brave"),
            vec![raw("https://a.example/1", 1.0), raw("https://a.example/2", 0.5)],
        );

        let fused = fuse(&by_backend, FusionMethod::Hybrid, 10, default_weight);
        for pair in fused.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn fusion_is_invariant_to_input_map_iteration_order() {
        let mut a = HashMap::new();
        a.insert(BackendId::new("brave"), vec![raw("https://a.example/1", 1.0)]);
        a.insert(BackendId::new("bing"), vec![raw("https://a.example/1", 0.8)]);

        let mut b = HashMap::new();
        b.insert(BackendId::new("bing"), vec![raw("https://a.example/1", 0.8)]);
        b.insert(BackendId::new("brave"), vec![raw("https://a.example/1", 1.0)]);

        let fused_a = fuse(&a, FusionMethod::Hybrid, 10, default_weight);
        let fused_b = fuse(&b, FusionMethod::Hybrid, 10, default_weight);
        assert!((fused_a[0].final_score - fused_b[0].final_score).abs() < 1e-12);
    }
}
