//! C4: local document chunking, indexing, and search gateway.
//!
//! Grounded on `local_docs.py`'s `LocalDocsSearch`: same chunking rule,
//! same idempotent-per-file indexing, same synthetic `file://` URLs for
//! results. The Python reference scores hits with
//! `1.0 - (results.index(result) * 0.1 if results else 0)` — calling
//! `.index()` on a list the result hasn't been appended to yet, which
//! only works by accident (it always resolves to the *previous*
//! length). That isn't carried over: this port scores by the
//! enumeration index the [`LocalIndex`] returns hits in.

mod chunk;
mod index;
mod pdf;
mod types;

pub use chunk::{chunk_id, chunk_text};
pub use index::{InMemoryLocalIndex, LocalIndex};
#[cfg(feature = "meilisearch")]
pub use index::MeilisearchIndex;
pub use types::{DocumentChunk, IndexConfig};

use search_core::RawResult;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

pub struct LocalDocIndexer {
    config: IndexConfig,
    index: Arc<dyn LocalIndex>,
}

impl LocalDocIndexer {
    pub fn new(config: IndexConfig, index: Arc<dyn LocalIndex>) -> Self {
        Self { config, index }
    }

    pub fn in_memory(config: IndexConfig) -> Self {
        Self::new(config, Arc::new(InMemoryLocalIndex::default()))
    }

    /// Indexes one file, replacing any chunks previously stored for it.
    /// Returns the number of chunks written; `0` if the file is missing
    /// or its extension isn't supported.
    pub async fn index_file(&self, file_path: &str) -> usize {
        let path = Path::new(file_path);
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return 0;
        };
        if !self.config.supports(extension) {
            return 0;
        }
        if !path.exists() {
            return 0;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or(file_path).to_string();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(&file_name);
        let title = derive_title(stem);
        let abs_path = path
            .canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| file_path.to_string());

        let is_pdf = extension.eq_ignore_ascii_case("pdf");
        let mut chunks = Vec::new();

        if is_pdf {
            for (page_num, content) in pdf::extract_pages(file_path) {
                let text_chunks = chunk::chunk_text(&content, self.config.chunk_size, self.config.chunk_overlap);
                let total = text_chunks.len();
                for (i, text) in text_chunks.into_iter().enumerate() {
                    chunks.push(DocumentChunk {
                        id: chunk::chunk_id(file_path, chunks.len()),
                        file_path: abs_path.clone(),
                        file_name: file_name.clone(),
                        title: format!("{title} - Page {page_num}"),
                        content: text,
                        page_number: Some(page_num),
                        chunk_index: i,
                        total_chunks: total,
                        file_type: "pdf".to_string(),
                        indexed_at: SystemTime::now(),
                    });
                }
            }
        } else {
            let Ok(content) = tokio::fs::read_to_string(file_path).await else {
                return 0;
            };
            let text_chunks = chunk::chunk_text(&content, self.config.chunk_size, self.config.chunk_overlap);
            let total = text_chunks.len();
            for (i, text) in text_chunks.into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    id: chunk::chunk_id(file_path, i),
                    file_path: abs_path.clone(),
                    file_name: file_name.clone(),
                    title: title.clone(),
                    content: text,
                    page_number: None,
                    chunk_index: i,
                    total_chunks: total,
                    file_type: extension.to_lowercase(),
                    indexed_at: SystemTime::now(),
                });
            }
        }

        if chunks.is_empty() {
            return 0;
        }
        let count = chunks.len();
        self.index.replace_chunks(&abs_path, chunks).await;
        count
    }

    /// Recursively indexes every supported file under `directory`.
    /// Returns a map of file path to chunk count for files that
    /// produced at least one chunk.
    pub async fn index_directory(&self, directory: &str) -> std::collections::HashMap<String, usize> {
        let mut results = std::collections::HashMap::new();
        for file_path in self.walk_supported_files(Path::new(directory)) {
            let count = self.index_file(&file_path).await;
            if count > 0 {
                results.insert(file_path, count);
            }
        }
        results
    }

    fn walk_supported_files(&self, dir: &Path) -> Vec<String> {
        let mut files = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return files;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(self.walk_supported_files(&path));
            } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if self.config.supports(ext) {
                    files.push(path.to_string_lossy().into_owned());
                }
            }
        }
        files
    }

    pub async fn search(&self, query: &str, limit: usize, file_type: Option<&str>) -> Vec<RawResult> {
        self.index.search(query, limit, file_type).await
    }

    pub async fn clear(&self) {
        self.index.clear().await;
    }
}

fn derive_title(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_title_replaces_separators_and_title_cases() {
        assert_eq!(derive_title("servo_alarm-codes"), "Servo Alarm Codes");
    }

    #[tokio::test]
    async fn index_file_rejects_unsupported_extensions() {
        let indexer = LocalDocIndexer::in_memory(IndexConfig::default());
        let count = indexer.index_file("/tmp/does-not-exist.exe").await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn index_file_returns_zero_for_missing_path() {
        let indexer = LocalDocIndexer::in_memory(IndexConfig::default());
        let count = indexer.index_file("/tmp/definitely-missing-12345.txt").await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn indexing_a_real_text_file_makes_it_searchable() {
        let dir = std::env::temp_dir().join(format!("search-index-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("servo_alarm_guide.txt");
        std::fs::write(&file_path, "Clear the servo alarm by resetting the controller.").unwrap();

        let indexer = LocalDocIndexer::in_memory(IndexConfig::default());
        let count = indexer.index_file(file_path.to_str().unwrap()).await;
        assert_eq!(count, 1);

        let results = indexer.search("servo alarm", 10, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Servo Alarm Guide");

        std::fs::remove_dir_all(&dir).ok();
    }
}
