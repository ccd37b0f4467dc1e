//! Text chunking module
//!
//! Splits document text into bounded segments so a single segment fits the
//! LLM context budget. Overlap carries a little continuity across a split
//! boundary.

use studymill_common::config::PipelineSettings;
use tracing::debug;

/// Split text into overlapping chunks of at most `chunk_size` characters.
pub fn chunk_text_with_overlap(text: &str, settings: &PipelineSettings) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total_len = chars.len();
    let mut chunks = Vec::new();

    if total_len == 0 || settings.chunk_size == 0 {
        return chunks;
    }

    let advance = if settings.chunk_overlap < settings.chunk_size {
        settings.chunk_size - settings.chunk_overlap
    } else {
        settings.chunk_size / 2
    }
    .max(1);

    let mut start = 0;
    while start < total_len {
        let end = (start + settings.chunk_size).min(total_len);
        let chunk: String = chars[start..end].iter().collect();

        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }

        if end == total_len {
            break;
        }
        start += advance;
    }

    debug!(
        input_len = total_len,
        chunk_count = chunks.len(),
        chunk_size = settings.chunk_size,
        "Text chunked"
    );

    chunks
}

/// Pick the LLM context for a document: the first chunk, or a raw-text
/// prefix when chunking produced nothing. Only the opening portion of the
/// document is ever summarized.
pub fn select_context(text: &str, settings: &PipelineSettings) -> String {
    chunk_text_with_overlap(text, settings)
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            text.chars()
                .take(settings.context_fallback_chars)
                .collect()
        })
}
