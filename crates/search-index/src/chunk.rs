//! Text chunking, ported from `LocalDocsSearch._chunk_text` in
//! `local_docs.py`.

use sha2::{Digest, Sha256};

/// Splits `text` into overlapping windows of roughly `chunk_size`
/// characters, preferring to break at the last sentence or line
/// boundary strictly past the chunk's midpoint.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            let window = &chars[start..end];
            let last_period = window.iter().rposition(|&c| c == '.');
            let last_newline = window.iter().rposition(|&c| c == '\n');
            let break_point = last_period.into_iter().chain(last_newline).max();

            if let Some(bp) = break_point {
                if bp > chunk_size / 2 {
                    end = start + bp + 1;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim().to_string();
        if !trimmed.is_empty() {
            chunks.push(trimmed);
        }

        if end >= len {
            break;
        }
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }

    chunks
}

/// First 16 hex characters of `sha256("{file_path}:{chunk_index}")`,
/// matching `_generate_chunk_id`.
pub fn chunk_id(file_path: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{file_path}:{chunk_index}").as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], hex_chars: usize) -> String {
    let mut s = String::with_capacity(hex_chars);
    for byte in bytes {
        if s.len() >= hex_chars {
            break;
        }
        s.push_str(&format!("{byte:02x}"));
    }
    s.truncate(hex_chars);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello world", 1000, 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn breaks_prefer_sentence_boundary_past_midpoint() {
        let mut text = "a".repeat(600);
        text.push('.');
        text.push_str(&"b".repeat(600));
        let chunks = chunk_text(&text, 1000, 100);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn chunk_id_is_stable_and_sixteen_hex_chars() {
        let id = chunk_id("/docs/manual.pdf", 3);
        assert_eq!(id.len(), 16);
        assert_eq!(id, chunk_id("/docs/manual.pdf", 3));
        assert_ne!(id, chunk_id("/docs/manual.pdf", 4));
    }
}
