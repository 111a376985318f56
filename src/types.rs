//! Data types for chunks, indexed vectors, and query results.

use serde::{Deserialize, Serialize};

/// A segment of a document produced by the chunker.
///
/// Chunks are transient: they are created once per document, handed to the
/// vector index, and never mutated afterwards. `page_number` is assigned
/// after chunking completes (the estimate needs the total chunk count) and
/// is approximate — see [`TextChunker::estimate_page_number`](crate::TextChunker::estimate_page_number).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Zero-based position of this chunk within its document.
    pub chunk_index: usize,
    /// The space-joined text of this chunk's word window.
    pub content: String,
    /// Character offset of the chunk within the normalized text.
    pub start_char: usize,
    /// Character offset one past the chunk within the normalized text.
    pub end_char: usize,
    /// Number of words in the chunk. At least 1.
    pub word_count: usize,
    /// Estimated page number, at least 1. Approximate.
    pub page_number: u32,
}

/// Metadata for one stored vector, positionally aligned with the vector list.
///
/// Chunk data is denormalized here because the index has no lookup into
/// external document storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Globally unique ID, derived from `(document_id, chunk_index)`.
    pub vector_id: String,
    /// Opaque key into the caller's document storage.
    pub document_id: i64,
    /// Zero-based chunk position within the document.
    pub chunk_index: usize,
    /// Name of the file the chunk came from.
    pub filename: String,
    /// The chunk's text content.
    pub content: String,
    /// Estimated page number for the chunk.
    pub page_number: u32,
    /// Character offset of the chunk within the normalized text.
    pub start_char: usize,
    /// Character offset one past the chunk within the normalized text.
    pub end_char: usize,
}

/// A retrieved [`VectorRecord`] with its similarity score and rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved metadata record.
    pub record: VectorRecord,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
    /// 1-based position in the ranked result list.
    pub rank: usize,
}

/// A cited source in a [`QueryResult`], deduplicated by file and page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Name of the source file.
    pub filename: String,
    /// Estimated page number within the file.
    pub page: u32,
    /// Similarity score of the first retrieved chunk from this source,
    /// rounded to three decimals.
    pub similarity_score: f32,
}

/// The answer to a question, with the sources that grounded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The generated answer, or a placeholder explaining why none was generated.
    pub answer: String,
    /// Unique `(filename, page)` sources in first-seen rank order.
    pub sources: Vec<Source>,
    /// False only when zero chunks were retrieved.
    pub context_used: bool,
    /// Number of chunks retrieved for this query.
    pub chunks_retrieved: usize,
}

/// A snapshot of vector index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored vectors.
    pub total_vectors: usize,
    /// Embedding dimensionality of the index.
    pub dimension: usize,
    /// Number of distinct document IDs currently present.
    pub total_documents: usize,
    /// Whether the persisted vectors file exists on disk.
    pub vectors_file_exists: bool,
    /// Whether the persisted metadata file exists on disk.
    pub metadata_file_exists: bool,
}
