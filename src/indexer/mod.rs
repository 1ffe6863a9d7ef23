//! Codebase indexer for RAG-based search
//!
//! Files are filtered, split into overlapping chunks, embedded through a remote
//! provider and held in an in-memory vector store backed by SQLite.

pub mod chunker;
pub mod embedder;
pub mod filter;
pub mod github;
pub mod pipeline;
pub mod reconstruct;
pub mod store;

use serde::{Deserialize, Serialize};

/// A slice of a source file produced by the chunker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the first character (inclusive)
    pub start_offset: usize,
    /// Byte offset one past the last character
    pub end_offset: usize,
}

/// Position of a stored chunk inside its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub start_offset: usize,
    pub end_offset: usize,
}

/// An embedded chunk as owned by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// `<file_path>-<chunk_index>`
    pub id: String,
    /// Path relative to the ingested root, `/`-separated
    pub file_path: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorDocument {
    pub fn from_chunk(file_path: &str, index: usize, chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: format!("{}-{}", file_path, index),
            file_path: file_path.to_string(),
            content: chunk.text,
            embedding,
            metadata: ChunkMetadata {
                start_offset: chunk.start_offset,
                end_offset: chunk.end_offset,
            },
        }
    }
}

/// A search hit with its cosine similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc: VectorDocument,
    /// Cosine similarity in [-1, 1], higher is more similar
    pub score: f32,
}

/// Configuration for the indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Chunk window for source code
    pub code_chunk_size: usize,
    pub code_overlap: usize,
    /// Chunk window for prose and data files
    pub doc_chunk_size: usize,
    pub doc_overlap: usize,
    /// Only snap to a newline found within this trailing fraction of the window
    pub newline_window: f32,
    /// Never snap a chunk below this fraction of the window
    pub min_chunk_fraction: f32,
    /// Files embedded at the same time
    pub embedding_concurrency: usize,
    /// Parallel downloads when importing a GitHub repository
    pub download_concurrency: usize,
    /// Consecutive chunk failures that abort an ingestion
    pub max_consecutive_failures: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            code_chunk_size: 500,
            code_overlap: 50,
            doc_chunk_size: 800,
            doc_overlap: 100,
            newline_window: 0.2,
            min_chunk_fraction: 0.5,
            embedding_concurrency: filter::EMBEDDING_CONCURRENCY,
            download_concurrency: filter::DOWNLOAD_CONCURRENCY,
            max_consecutive_failures: 3,
        }
    }
}
