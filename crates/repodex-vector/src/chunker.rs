//! Fixed-size overlapping windows over document text.
//!
//! Window size and overlap are configuration (in characters, so multi-byte
//! text never splits inside a code point). Sequence numbers start at zero
//! and are contiguous per document; an empty file yields zero chunks.

use repodex_core::config::ChunkingSettings;
use repodex_core::types::{Chunk, DocId};

pub fn chunk_text(doc_id: &DocId, text: &str, settings: &ChunkingSettings) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let window = settings.window.max(1);
    let step = window.saturating_sub(settings.overlap).max(1);

    // Byte offset of every char start, plus the end sentinel.
    let starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = starts.len();
    let byte_at = |char_idx: usize| -> usize {
        if char_idx >= char_count {
            text.len()
        } else {
            starts[char_idx]
        }
    };

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(char_count);
        let span = &text[byte_at(start)..byte_at(end)];
        if !span.trim().is_empty() {
            spans.push(span.to_string());
        }
        if end == char_count {
            break;
        }
        start += step;
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(seq, text)| Chunk {
            doc_id: doc_id.clone(),
            seq: seq as u32,
            text,
        })
        .collect()
}
