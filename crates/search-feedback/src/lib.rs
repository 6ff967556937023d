//! C8: learns per-`(backend, category)` engine weights from engagement
//! signals.
//!
//! Grounded on `feedback_loop.py`'s `FeedbackLoop`/`EnginePerformance`:
//! identical `ctr`/`dwell_rate`/`helpful_rate` formulas, identical
//! `engagement_score` weighting (40% CTR, 25% dwell, 25% helpful, 10%
//! position), identical `recommended_weight` piecewise mapping, and the
//! same `min_samples` gate before a learned weight is trusted. The
//! capped-at-1000 Redis list of raw feedback events becomes an
//! in-process bounded ring buffer per category.

use search_core::{BackendId, Category, EngagementRecord, FeedbackSignal, FusedResult};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

const MAX_RAW_EVENTS_PER_CATEGORY: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct EnginePerformance {
    pub impressions: u64,
    pub clicks: u64,
    pub dwells: u64,
    pub helpful: u64,
    pub not_helpful: u64,
    pub total_dwell_ms: u64,
    pub avg_click_position: f64,
}

impl EnginePerformance {
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }

    pub fn dwell_rate(&self) -> f64 {
        self.dwells as f64 / (self.clicks.max(1) as f64)
    }

    pub fn helpful_rate(&self) -> f64 {
        let total = self.helpful + self.not_helpful;
        if total == 0 {
            0.0
        } else {
            self.helpful as f64 / total as f64
        }
    }

    pub fn engagement_score(&self) -> f64 {
        let ctr_score = (self.ctr() * 5.0).min(1.0);
        let dwell_score = self.dwell_rate().min(1.0);
        let position_score = 1.0 / self.avg_click_position.max(1.0);

        0.40 * ctr_score + 0.25 * dwell_score + 0.25 * self.helpful_rate() + 0.10 * position_score
    }

    pub fn recommended_weight(&self) -> f64 {
        let score = self.engagement_score();
        if score < 0.5 {
            0.5 + score
        } else {
            1.0 + 2.0 * (score - 0.5)
        }
    }

    fn record_click(&mut self, position: usize) {
        self.clicks += 1;
        self.avg_click_position =
            (self.avg_click_position * (self.clicks - 1) as f64 + position as f64) / self.clicks as f64;
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub min_samples: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { min_samples: 10 }
    }
}

pub struct FeedbackLearner {
    config: FeedbackConfig,
    performance: Mutex<HashMap<(BackendId, Category), EnginePerformance>>,
    raw_events: Mutex<HashMap<Category, VecDeque<EngagementRecord>>>,
}

impl FeedbackLearner {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            performance: Mutex::new(HashMap::new()),
            raw_events: Mutex::new(HashMap::new()),
        }
    }

    /// Records that `results` were shown for `category`; increments
    /// impressions for every backend that contributed to each result.
    pub async fn record_impression(&self, category: Category, results: &[FusedResult]) {
        let mut performance = self.performance.lock().await;
        for result in results {
            for backend in &result.engines {
                performance.entry((backend.clone(), category)).or_default().impressions += 1;
            }
        }
    }

    pub async fn record_feedback(&self, record: EngagementRecord) {
        {
            let mut performance = self.performance.lock().await;
            let perf = performance.entry((record.backend.clone(), record.category)).or_default();

            match record.signal {
                FeedbackSignal::Click => perf.record_click(record.position),
                FeedbackSignal::Dwell => {
                    perf.dwells += 1;
                    if let Some(ms) = record.dwell_ms {
                        perf.total_dwell_ms += ms;
                    }
                }
                FeedbackSignal::Helpful => perf.helpful += 1,
                FeedbackSignal::NotHelpful => perf.not_helpful += 1,
                FeedbackSignal::Reformulate | FeedbackSignal::NoClick => {}
            }
        }

        let mut raw_events = self.raw_events.lock().await;
        let bucket = raw_events.entry(record.category).or_default();
        bucket.push_back(record);
        while bucket.len() > MAX_RAW_EVENTS_PER_CATEGORY {
            bucket.pop_front();
        }
    }

    /// The recommended weight for a `(backend, category)` pair, or
    /// `1.0` until `min_samples` impressions have been recorded.
    pub async fn weight(&self, backend: &BackendId, category: Category) -> f64 {
        let performance = self.performance.lock().await;
        match performance.get(&(backend.clone(), category)) {
            Some(perf) if perf.impressions >= self.config.min_samples => perf.recommended_weight(),
            _ => 1.0,
        }
    }

    pub async fn ranked_engines(&self, category: Category, available: &[BackendId]) -> Vec<(BackendId, f64)> {
        let mut ranked = Vec::with_capacity(available.len());
        for backend in available {
            ranked.push((backend.clone(), self.weight(backend, category).await));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused_for(engines: Vec<&str>) -> FusedResult {
        FusedResult {
            url: "https://a.example".into(),
            title: "t".into(),
            content: "c".into(),
            engines: engines.into_iter().map(BackendId::new).collect(),
            rrf_score: 0.0,
            weighted_score: 0.0,
            borda_score: 0.0,
            final_score: 0.0,
            original_scores: HashMap::new(),
            original_ranks: HashMap::new(),
            metadata: HashMap::new(),
            source: search_core::ResultSource::Backend,
        }
    }

    #[tokio::test]
    async fn weight_stays_neutral_until_min_samples_is_reached() {
        let learner = FeedbackLearner::new(FeedbackConfig::default());
        let backend = BackendId::new("brave");

        for _ in 0..9 {
            learner.record_impression(Category::Industrial, &[fused_for(vec!["brave"])]).await;
        }
        assert_eq!(learner.weight(&backend, Category::Industrial).await, 1.0);

        learner.record_impression(Category::Industrial, &[fused_for(vec!["brave"])]).await;
        let weight = learner.weight(&backend, Category::Industrial).await;
        assert!((weight - 0.5).abs() < 1e-9 || weight != 1.0);
    }

    #[tokio::test]
    async fn a_click_updates_rolling_average_position() {
        let learner = FeedbackLearner::new(FeedbackConfig::default());
        let backend = BackendId::new("brave");

        learner
            .record_feedback(EngagementRecord {
                backend: backend.clone(),
                category: Category::General,
                signal: FeedbackSignal::Click,
                position: 1,
                dwell_ms: None,
                session_id: None,
            })
            .await;
        learner
            .record_feedback(EngagementRecord {
                backend: backend.clone(),
                category: Category::General,
                signal: FeedbackSignal::Click,
                position: 3,
                dwell_ms: None,
                session_id: None,
            })
            .await;

        let performance = learner.performance.lock().await;
        let perf = performance.get(&(backend, Category::General)).unwrap();
        assert!((perf.avg_click_position - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn raw_event_buffer_is_capped_at_one_thousand_per_category() {
        let learner = FeedbackLearner::new(FeedbackConfig::default());
        for i in 0..1200 {
            learner
                .record_feedback(EngagementRecord {
                    backend: BackendId::new("brave"),
                    category: Category::General,
                    signal: FeedbackSignal::Click,
                    position: (i % 10) + 1,
                    dwell_ms: None,
                    session_id: None,
                })
                .await;
        }
        let raw_events = learner.raw_events.lock().await;
        assert_eq!(raw_events.get(&Category::General).unwrap().len(), 1000);
    }
}
