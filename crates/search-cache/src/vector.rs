//! Capability traits for the semantic (L2) tier.
//!
//! Production deployments back these with a real embedding model and a
//! vector database; in their absence the engine still runs, it just
//! never gets an L2 hit. Mirrors the graceful-degradation shape of the
//! reference implementation's optional `sentence_transformers`/`qdrant`
//! imports, expressed here as swappable trait objects instead of a
//! runtime `is_available()` flag.

use async_trait::async_trait;
use search_core::{CacheEntry, Fingerprint};
use tokio::sync::Mutex;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns `None` when no embedding backend is configured.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Default provider: always degrades, so the cache runs L1-only.
pub struct NullEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, id: Fingerprint, vector: Vec<f32>, entry: CacheEntry);

    /// Nearest neighbor by cosine similarity, filtered to `threshold` or
    /// above. `None` if the index is empty or nothing clears the bar.
    async fn query_top1(&self, vector: &[f32], threshold: f32) -> Option<CacheEntry>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Brute-force in-process index. Fine for the scale of a process-local
/// cache; a real deployment swaps this for a Qdrant/pgvector-backed
/// `VectorIndex`.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: Mutex<Vec<(Fingerprint, Vec<f32>, CacheEntry)>>,
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, id: Fingerprint, vector: Vec<f32>, entry: CacheEntry) {
        let mut entries = self.entries.lock().await;
        if let Some(slot) = entries.iter_mut().find(|(existing, _, _)| *existing == id) {
            *slot = (id, vector, entry);
        } else {
            entries.push((id, vector, entry));
        }
    }

    async fn query_top1(&self, vector: &[f32], threshold: f32) -> Option<CacheEntry> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .map(|(_, v, entry)| (cosine_similarity(vector, v), entry))
            .filter(|(sim, _)| *sim >= threshold)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap())
            .map(|(_, entry)| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[tokio::test]
    async fn null_provider_always_degrades() {
        let provider = NullEmbeddingProvider;
        assert!(provider.embed("anything").await.is_none());
    }
}
