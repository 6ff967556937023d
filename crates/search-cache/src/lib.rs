//! C3: two-tier exact-hash (L1) + semantic (L2) result cache.
//!
//! Grounded on `semantic_cache.py`'s `SemanticCache` (Redis L1 / Qdrant L2
//! split, `_hash_query` fingerprinting, best-effort cross-tier
//! consistency) and on `tower-resilience-cache`'s `CacheStore` for the
//! Rust-idiomatic TTL-wrapped LRU shape.

mod vector;

pub use vector::{EmbeddingProvider, InMemoryVectorIndex, NullEmbeddingProvider, VectorIndex};

use lru::LruCache;
use search_core::{BackendId, CacheEntry, CacheTier, Fingerprint, FusedResult};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l1_capacity: usize,
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub similarity_threshold: f32,
    pub max_cached_results: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 10_000,
            l1_ttl: Duration::from_secs(3600),
            l2_ttl: Duration::from_secs(86_400),
            similarity_threshold: 0.80,
            max_cached_results: 20,
        }
    }
}

pub struct TwoTierCache {
    config: CacheConfig,
    l1: Mutex<LruCache<Fingerprint, CacheEntry>>,
    l2: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl TwoTierCache {
    pub fn new(
        config: CacheConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        l2: Arc<dyn VectorIndex>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.l1_capacity.max(1)).unwrap();
        Self {
            config,
            l1: Mutex::new(LruCache::new(capacity)),
            l2,
            embeddings,
        }
    }

    /// Builds a cache with no-op embedding/vector backends — useful for
    /// tests or deployments that only want the L1 exact-hash tier.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(
            config,
            Arc::new(NullEmbeddingProvider),
            Arc::new(InMemoryVectorIndex::default()),
        )
    }

    /// Probes L1 first, then L2 for the nearest entry above the
    /// similarity threshold.
    pub async fn get(&self, normalized_query: &str, backends: &[BackendId]) -> (Option<CacheEntry>, CacheTier) {
        let fingerprint = Fingerprint::compute(normalized_query, backends);

        {
            let mut l1 = self.l1.lock().await;
            if let Some(entry) = l1.get_mut(&fingerprint) {
                if !entry.is_expired() {
                    entry.hit_count += 1;
                    return (Some(entry.clone()), CacheTier::L1);
                }
                l1.pop(&fingerprint);
            }
        }

        if let Some(vector) = self.embeddings.embed(normalized_query).await {
            if let Some(entry) = self.l2.query_top1(&vector, self.config.similarity_threshold).await {
                if !entry.is_expired() {
                    return (Some(entry), CacheTier::L2);
                }
            }
        }

        (None, CacheTier::Miss)
    }

    /// Truncates to `max_cached_results` and writes both tiers. The L2
    /// payload is a full, self-sufficient `CacheEntry` so an L1 eviction
    /// never invalidates an L2 hit.
    pub async fn put(&self, normalized_query: &str, backends: &[BackendId], mut results: Vec<FusedResult>) {
        results.truncate(self.config.max_cached_results);
        let fingerprint = Fingerprint::compute(normalized_query, backends);

        let entry = CacheEntry {
            query: normalized_query.to_string(),
            fingerprint,
            results,
            engines: backends.to_vec(),
            created_at: Instant::now(),
            ttl: self.config.l1_ttl,
            hit_count: 0,
        };

        {
            let mut l1 = self.l1.lock().await;
            l1.put(fingerprint, entry.clone());
        }

        if let Some(vector) = self.embeddings.embed(normalized_query).await {
            let mut l2_entry = entry;
            l2_entry.ttl = self.config.l2_ttl;
            self.l2.upsert(fingerprint, vector, l2_entry).await;
        }
    }

    /// Drops the L1 entry only; L2 relies on its own TTL, matching the
    /// reference implementation's `invalidate`.
    pub async fn invalidate(&self, normalized_query: &str, backends: &[BackendId]) {
        let fingerprint = Fingerprint::compute(normalized_query, backends);
        let mut l1 = self.l1.lock().await;
        l1.pop(&fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_core::ResultSource;
    use std::collections::HashMap;

    fn fused(url: &str) -> FusedResult {
        FusedResult {
            url: url.into(),
            title: "t".into(),
            content: "c".into(),
            engines: vec![BackendId::new("brave")],
            rrf_score: 1.0,
            weighted_score: 1.0,
            borda_score: 1.0,
            final_score: 1.0,
            original_scores: HashMap::new(),
            original_ranks: HashMap::new(),
            metadata: HashMap::new(),
            source: ResultSource::Backend,
        }
    }

    #[tokio::test]
    async fn put_then_get_is_an_l1_hit() {
        let cache = TwoTierCache::in_memory(CacheConfig::default());
        let backends = vec![BackendId::new("brave")];

        cache.put("rust async", &backends, vec![fused("https://a.example")]).await;
        let (entry, tier) = cache.get("rust async", &backends).await;

        assert_eq!(tier, CacheTier::L1);
        let entry = entry.unwrap();
        assert_eq!(entry.hit_count, 1);
        assert_eq!(entry.results.len(), 1);
    }

    #[tokio::test]
    async fn distinct_backend_sets_produce_distinct_fingerprints() {
        let cache = TwoTierCache::in_memory(CacheConfig::default());
        cache
            .put("rust async", &[BackendId::new("brave")], vec![fused("https://a.example")])
            .await;

        let (entry, tier) = cache.get("rust async", &[BackendId::new("bing")]).await;
        assert!(entry.is_none());
        assert_eq!(tier, CacheTier::Miss);
    }

    #[tokio::test]
    async fn results_are_truncated_to_max_cached_results() {
        let config = CacheConfig {
            max_cached_results: 2,
            ..CacheConfig::default()
        };
        let cache = TwoTierCache::in_memory(config);
        let backends = vec![BackendId::new("brave")];
        let results = vec![fused("https://a.example/1"), fused("https://a.example/2"), fused("https://a.example/3")];

        cache.put("q", &backends, results).await;
        let (entry, _) = cache.get("q", &backends).await;
        assert_eq!(entry.unwrap().results.len(), 2);
    }
}
