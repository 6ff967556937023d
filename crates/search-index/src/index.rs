//! The `LocalIndex` capability trait plus its two implementations.
//!
//! The reference implementation talks to a real Meilisearch server and
//! degrades to "unavailable" when the `meilisearch` Python package is
//! missing. Here that's a trait object: `InMemoryLocalIndex` always
//! works (used in tests and offline deployments), `MeilisearchIndex`
//! speaks Meilisearch's plain HTTP API directly via `reqwest` so the
//! crate doesn't need a dedicated (and unavailable in this pack) SDK
//! crate for it.

use crate::types::DocumentChunk;
use async_trait::async_trait;
use search_core::{BackendId, RawResult};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait LocalIndex: Send + Sync {
    /// Replaces any chunks previously indexed for `file_path` with
    /// `chunks` — indexing is idempotent per source file.
    async fn replace_chunks(&self, file_path: &str, chunks: Vec<DocumentChunk>);

    async fn search(&self, query: &str, limit: usize, file_type: Option<&str>) -> Vec<RawResult>;

    async fn clear(&self);
}

/// Naive substring-scored index. Good enough for tests and for running
/// without a Meilisearch deployment; real typo-tolerant ranking is
/// Meilisearch's job in production.
#[derive(Default)]
pub struct InMemoryLocalIndex {
    by_file: Mutex<HashMap<String, Vec<DocumentChunk>>>,
}

#[async_trait]
impl LocalIndex for InMemoryLocalIndex {
    async fn replace_chunks(&self, file_path: &str, chunks: Vec<DocumentChunk>) {
        let mut by_file = self.by_file.lock().await;
        by_file.insert(file_path.to_string(), chunks);
    }

    async fn search(&self, query: &str, limit: usize, file_type: Option<&str>) -> Vec<RawResult> {
        let needle = query.to_lowercase();
        let by_file = self.by_file.lock().await;

        let mut hits: Vec<&DocumentChunk> = by_file
            .values()
            .flatten()
            .filter(|chunk| {
                file_type.map(|ft| chunk.file_type.eq_ignore_ascii_case(ft)).unwrap_or(true)
            })
            .filter(|chunk| {
                chunk.content.to_lowercase().contains(&needle) || chunk.title.to_lowercase().contains(&needle)
            })
            .collect();

        hits.truncate(limit);

        hits.into_iter()
            .enumerate()
            .map(|(rank, chunk)| RawResult {
                title: chunk.title.clone(),
                url: chunk.synthetic_url(),
                content: truncate_content(&chunk.content),
                backend: BackendId::new("local_docs"),
                score: 1.0 - (rank as f64 * 0.1),
                category: "files".to_string(),
                thumbnail: None,
                published_date: None,
                metadata: chunk_metadata(chunk),
            })
            .collect()
    }

    async fn clear(&self) {
        self.by_file.lock().await.clear();
    }
}

/// Speaks Meilisearch's REST API directly: `POST /indexes/{index}/documents`
/// for indexing, `POST /indexes/{index}/search` for queries. Requires
/// the `meilisearch` feature (pulls in `reqwest`).
#[cfg(feature = "meilisearch")]
pub struct MeilisearchIndex {
    client: reqwest::Client,
    base_url: String,
    index_name: String,
    api_key: String,
}

#[cfg(feature = "meilisearch")]
impl MeilisearchIndex {
    pub fn new(base_url: impl Into<String>, index_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            index_name: index_name.into(),
            api_key: api_key.into(),
        }
    }

    fn documents_url(&self) -> String {
        format!("{}/indexes/{}/documents", self.base_url, self.index_name)
    }

    fn search_url(&self) -> String {
        format!("{}/indexes/{}/search", self.base_url, self.index_name)
    }
}

#[cfg(feature = "meilisearch")]
#[async_trait]
impl LocalIndex for MeilisearchIndex {
    async fn replace_chunks(&self, file_path: &str, chunks: Vec<DocumentChunk>) {
        let docs: Vec<serde_json::Value> = chunks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "file_path": c.file_path,
                    "file_name": c.file_name,
                    "title": c.title,
                    "content": c.content,
                    "page_number": c.page_number,
                    "chunk_index": c.chunk_index,
                    "total_chunks": c.total_chunks,
                    "file_type": c.file_type,
                })
            })
            .collect();

        if docs.is_empty() {
            return;
        }

        let _ = self
            .client
            .post(self.documents_url())
            .bearer_auth(&self.api_key)
            .json(&docs)
            .send()
            .await;

        let _ = file_path;
    }

    async fn search(&self, query: &str, limit: usize, file_type: Option<&str>) -> Vec<RawResult> {
        let mut body = serde_json::json!({
            "q": query,
            "limit": limit,
            "attributesToHighlight": ["content", "title"],
        });
        if let Some(ft) = file_type {
            body["filter"] = serde_json::Value::String(format!("file_type = {ft}"));
        }

        let response = match self
            .client
            .post(self.search_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(_) => return Vec::new(),
        };

        let parsed: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let hits = parsed["hits"].as_array().cloned().unwrap_or_default();
        hits.into_iter()
            .enumerate()
            .map(|(rank, hit)| RawResult {
                title: hit["title"].as_str().unwrap_or("Untitled").to_string(),
                url: synthetic_url_from_hit(&hit),
                content: hit["content"].as_str().unwrap_or("").to_string(),
                backend: BackendId::new("local_docs"),
                score: 1.0 - (rank as f64 * 0.1),
                category: "files".to_string(),
                thumbnail: None,
                published_date: None,
                metadata: HashMap::new(),
            })
            .collect()
    }

    async fn clear(&self) {
        let _ = self.client.delete(self.documents_url()).bearer_auth(&self.api_key).send().await;
    }
}

#[cfg(feature = "meilisearch")]
fn synthetic_url_from_hit(hit: &serde_json::Value) -> String {
    let path = hit["file_path"].as_str().unwrap_or("");
    match hit["page_number"].as_u64() {
        Some(page) => format!("file://{path}#page={page}"),
        None => format!("file://{path}"),
    }
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() > 300 {
        let truncated: String = content.chars().take(300).collect();
        format!("{truncated}...")
    } else {
        content.to_string()
    }
}

fn chunk_metadata(chunk: &DocumentChunk) -> HashMap<String, serde_json::Value> {
    let mut metadata = HashMap::new();
    metadata.insert("file_name".to_string(), serde_json::Value::String(chunk.file_name.clone()));
    if let Some(page) = chunk.page_number {
        metadata.insert("page_number".to_string(), serde_json::json!(page));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn chunk(file_name: &str, title: &str, content: &str, file_type: &str) -> DocumentChunk {
        DocumentChunk {
            id: "abc".into(),
            file_path: format!("/docs/{file_name}"),
            file_name: file_name.into(),
            title: title.into(),
            content: content.into(),
            page_number: Some(3),
            chunk_index: 0,
            total_chunks: 1,
            file_type: file_type.into(),
            indexed_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn search_scores_results_by_enumeration_rank() {
        let index = InMemoryLocalIndex::default();
        index
            .replace_chunks(
                "/docs/manual.pdf",
                vec![
                    chunk("manual.pdf", "Servo Alarm Guide", "how to clear a servo alarm", "pdf"),
                    chunk("manual.pdf", "Other Guide", "servo alarm troubleshooting steps", "pdf"),
                ],
            )
            .await;

        let results = index.search("servo alarm", 10, None).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.9);
        assert!(results[0].url.ends_with("#page=3"));
    }

    #[tokio::test]
    async fn file_type_filter_excludes_non_matching_chunks() {
        let index = InMemoryLocalIndex::default();
        index
            .replace_chunks("/docs/a.pdf", vec![chunk("a.pdf", "A", "alarm", "pdf")])
            .await;
        index
            .replace_chunks("/docs/b.txt", vec![chunk("b.txt", "B", "alarm", "txt")])
            .await;

        let results = index.search("alarm", 10, Some("pdf")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.get("file_name").unwrap(), "a.pdf");
    }

    #[tokio::test]
    async fn replace_chunks_is_idempotent_per_file() {
        let index = InMemoryLocalIndex::default();
        index
            .replace_chunks("/docs/a.pdf", vec![chunk("a.pdf", "A", "alarm v1", "pdf")])
            .await;
        index
            .replace_chunks("/docs/a.pdf", vec![chunk("a.pdf", "A", "alarm v2", "pdf")])
            .await;

        let results = index.search("alarm", 10, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "alarm v2");
    }
}
