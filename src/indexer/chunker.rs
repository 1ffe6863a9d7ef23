//! Text chunking for embedding generation
//!
//! Splits file content into overlapping windows. Before each cut the window end is
//! snapped back to a newline, or failing that to a `;` or `}`, so chunks tend to
//! end on statement boundaries. Offsets are byte offsets into the UTF-8 source.

use super::{Chunk, IndexerConfig};
use std::path::Path;

/// Extensions chunked with the larger prose/data window
const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "csv", "xml", "md", "txt"];

/// Broad content class deciding the chunk window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Code,
    Document,
}

impl ContentClass {
    pub fn of(file_path: &str) -> Self {
        let is_document = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        if is_document {
            ContentClass::Document
        } else {
            ContentClass::Code
        }
    }
}

/// Window and snapping parameters for one chunking call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Trailing fraction of the window searched for a newline
    pub newline_window: f32,
    /// Snapped chunks must stay longer than this fraction of the window
    pub min_chunk_fraction: f32,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            newline_window: 0.2,
            min_chunk_fraction: 0.5,
        }
    }

    /// Code is denser per character than prose, so it gets the smaller window.
    pub fn for_path(file_path: &str, config: &IndexerConfig) -> Self {
        let (chunk_size, overlap) = match ContentClass::of(file_path) {
            ContentClass::Document => (config.doc_chunk_size, config.doc_overlap),
            ContentClass::Code => (config.code_chunk_size, config.code_overlap),
        };
        Self {
            chunk_size,
            overlap,
            newline_window: config.newline_window,
            min_chunk_fraction: config.min_chunk_fraction,
        }
    }
}

/// Chunk text with the default snapping thresholds
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    chunk_text_with(text, ChunkParams::new(chunk_size, overlap))
}

/// Chunk text into overlapping, delimiter-aware slices
pub fn chunk_text_with(text: &str, params: ChunkParams) -> Vec<Chunk> {
    if text.is_empty() {
        return vec![];
    }

    let len = text.len();
    let size = params.chunk_size.max(1);

    if len <= size {
        return vec![Chunk {
            text: text.to_string(),
            start_offset: 0,
            end_offset: len,
        }];
    }

    let newline_floor = (size as f32 * (1.0 - params.newline_window)) as usize;
    let min_len = (size as f32 * params.min_chunk_fraction) as usize;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let naive_end = start + size;
        let end = if naive_end >= len {
            len
        } else {
            let mut end = floor_char_boundary(text, naive_end);
            if end <= start {
                end = ceil_char_boundary(text, start + 1);
            }
            snap_end(text, start, end, newline_floor, min_len)
        };

        chunks.push(Chunk {
            text: text[start..end].to_string(),
            start_offset: start,
            end_offset: end,
        });

        if end >= len {
            break;
        }

        // Always make forward progress, even when overlap >= chunk length
        let next = end.saturating_sub(params.overlap);
        start = if next > start {
            ceil_char_boundary(text, next)
        } else {
            end
        };
    }

    chunks
}

/// Pull a cut back onto a delimiter, keeping the delimiter in the chunk.
fn snap_end(text: &str, start: usize, end: usize, newline_floor: usize, min_len: usize) -> usize {
    let window = &text.as_bytes()[start..end];

    let mut split = window.iter().rposition(|&b| b == b'\n');
    if split.map_or(true, |idx| idx < newline_floor) {
        let semi = window.iter().rposition(|&b| b == b';');
        let brace = window.iter().rposition(|&b| b == b'}');
        split = semi.max(brace);
    }

    match split {
        Some(idx) if idx > min_len => start + idx + 1,
        _ => end,
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
