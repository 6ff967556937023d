use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub title: String,
    pub content: String,
    pub page_number: Option<u32>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub file_type: String,
    pub indexed_at: SystemTime,
}

impl DocumentChunk {
    /// `file://{abs_path}#page={n}` when a page is known, else
    /// `file://{abs_path}` — matches `SearchResult.to_searxng_format`.
    pub fn synthetic_url(&self) -> String {
        match self.page_number {
            Some(page) => format!("file://{}#page={}", self.file_path, page),
            None => format!("file://{}", self.file_path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub supported_extensions: Vec<&'static str>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            supported_extensions: vec!["pdf", "txt", "md", "rst"],
        }
    }
}

impl IndexConfig {
    pub fn supports(&self, extension: &str) -> bool {
        self.supported_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}
