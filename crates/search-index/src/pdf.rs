//! PDF page-by-page text extraction, behind the `pdf` feature.
//!
//! `local_docs.py` leans on `pypdf`; the closest idiomatic Rust
//! equivalent in this pack is `lopdf`, used the same way other example
//! repos reach for it for low-level page access.

#[cfg(feature = "pdf")]
pub fn extract_pages(file_path: &str) -> Vec<(u32, String)> {
    let doc = match lopdf::Document::load(file_path) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };

    let mut pages = Vec::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(text) = doc.extract_text(&[page_num]) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                pages.push((page_num, trimmed.to_string()));
            }
        }
    }
    pages.sort_by_key(|(page_num, _)| *page_num);
    pages
}

#[cfg(not(feature = "pdf"))]
pub fn extract_pages(_file_path: &str) -> Vec<(u32, String)> {
    Vec::new()
}
