//! Flat cosine-similarity vector index with aligned metadata and JSON persistence.
//!
//! [`VectorIndex`] stores embeddings in a flat list scored by inner product
//! (cosine similarity, since every stored vector is unit-normalized) and a
//! parallel metadata list. Position `i` in the vector list always
//! corresponds to metadata record `i`; every mutation preserves that
//! alignment, including document deletion, which rebuilds both lists.
//!
//! State is durable across restarts via two versioned JSON files under the
//! configured data directory. Unreadable prior state is logged and replaced
//! with an empty index rather than failing; a dimension or schema-version
//! mismatch is a fatal configuration error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::types::{Chunk, IndexStats, ScoredChunk, VectorRecord};

const VECTORS_FILE: &str = "vectors.json";
const METADATA_FILE: &str = "metadata.json";
const PERSIST_VERSION: u32 = 1;

/// Persisted envelope for the similarity structure.
#[derive(Deserialize)]
struct VectorsFile {
    version: u32,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct VectorsFileRef<'a> {
    version: u32,
    dimension: usize,
    vectors: &'a [Vec<f32>],
}

/// Persisted envelope for the metadata records.
#[derive(Deserialize)]
struct MetadataFile {
    version: u32,
    records: Vec<VectorRecord>,
}

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    version: u32,
    records: &'a [VectorRecord],
}

#[derive(Default)]
struct IndexState {
    vectors: Vec<Vec<f32>>,
    records: Vec<VectorRecord>,
}

/// An append-only flat similarity index over embedded document chunks.
///
/// Writes (`add_chunks`, `delete_document`) take the write half of a single
/// `RwLock`; searches take the read half, so readers never observe the two
/// containers mid-mutation. Embedding calls happen outside the lock and are
/// wrapped in the configured request timeout.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{RagConfig, VectorIndex};
///
/// let index = VectorIndex::open(&RagConfig::default(), embedder)?;
/// let ids = index.add_chunks(&chunks, 42, "report.pdf").await?;
/// let hits = index.search("what does the report conclude?", 5).await?;
/// ```
pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    data_dir: PathBuf,
    request_timeout: Duration,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.dimension)
            .field("data_dir", &self.data_dir)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Open (or create) an index under `config.data_dir`.
    ///
    /// Prior persisted state is loaded if present. Missing or unreadable
    /// files reset the index to empty with a warning; a schema version or
    /// dimension mismatch in readable files is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedder's dimensionality
    /// disagrees with `config.dimension` or the persisted files were written
    /// for a different dimension or schema version.
    pub fn open(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if embedder.dimensions() != config.dimension {
            return Err(RagError::ConfigError(format!(
                "embedder produces {}-dimensional vectors but the index is configured for {}",
                embedder.dimensions(),
                config.dimension
            )));
        }

        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            RagError::IndexError(format!(
                "failed to create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;

        let state = load_state(&config.data_dir, config.dimension)?;
        Ok(Self {
            embedder,
            dimension: config.dimension,
            data_dir: config.data_dir.clone(),
            request_timeout: config.request_timeout,
            state: RwLock::new(state),
        })
    }

    /// Return the embedding dimensionality of this index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed, normalize, and store a batch of chunks for one document.
    ///
    /// Chunks are embedded one at a time; the first failure aborts the call
    /// with nothing committed to the index or to disk. On success both the
    /// similarity structure and metadata are appended in chunk order and
    /// persisted before returning.
    ///
    /// Returns the generated vector IDs (`doc_{document_id}_chunk_{index}`)
    /// in chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if any chunk fails to embed or
    /// the embedder times out, and [`RagError::IndexError`] if persisting
    /// fails.
    pub async fn add_chunks(
        &self,
        chunks: &[Chunk],
        document_id: i64,
        filename: &str,
    ) -> Result<Vec<String>> {
        let mut staged_vectors = Vec::with_capacity(chunks.len());
        let mut staged_records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let vector = self.embed_normalized(&chunk.content).await?;
            staged_records.push(VectorRecord {
                vector_id: format!("doc_{document_id}_chunk_{}", chunk.chunk_index),
                document_id,
                chunk_index: chunk.chunk_index,
                filename: filename.to_string(),
                content: chunk.content.clone(),
                page_number: chunk.page_number,
                start_char: chunk.start_char,
                end_char: chunk.end_char,
            });
            staged_vectors.push(vector);
        }

        let vector_ids: Vec<String> =
            staged_records.iter().map(|r| r.vector_id.clone()).collect();

        let mut state = self.state.write().await;
        check_alignment(&state)?;
        state.vectors.extend(staged_vectors);
        state.records.extend(staged_records);
        self.persist(&state).await?;

        info!(
            document_id,
            chunk_count = chunks.len(),
            total_vectors = state.vectors.len(),
            "added chunks to vector index"
        );
        Ok(vector_ids)
    }

    /// Find the `k` stored chunks most similar to `query`.
    ///
    /// Scores every stored vector by inner product with the normalized
    /// query embedding and returns the top `min(k, total)` entries in
    /// descending score order, ranks starting at 1. Equal scores keep
    /// insertion order. An empty index returns an empty list without
    /// calling the embedder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the query fails to embed.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        {
            let state = self.state.read().await;
            check_alignment(&state)?;
            if state.vectors.is_empty() {
                warn!("searched an empty vector index");
                return Ok(Vec::new());
            }
        }

        let query_vector = self.embed_normalized(query).await?;

        let state = self.state.read().await;
        check_alignment(&state)?;

        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, dot(vector, &query_vector)))
            .collect();
        // Descending score, ties broken by insertion position for
        // deterministic ordering.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
        });
        scored.truncate(k.min(state.vectors.len()));

        let results: Vec<ScoredChunk> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (position, score))| ScoredChunk {
                record: state.records[position].clone(),
                score,
                rank: i + 1,
            })
            .collect();

        debug!(result_count = results.len(), k, "similarity search completed");
        Ok(results)
    }

    /// Remove every vector/metadata pair belonging to `document_id`.
    ///
    /// The flat structure has no native delete, so both containers are
    /// rebuilt in lockstep from the surviving entries. The in-memory
    /// vectors double as an embedding cache: the rebuild makes no
    /// embedding calls. A document with no stored vectors is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if persisting the rebuilt index fails.
    pub async fn delete_document(&self, document_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        check_alignment(&state)?;

        let before = state.records.len();
        let old_vectors = std::mem::take(&mut state.vectors);
        let old_records = std::mem::take(&mut state.records);
        for (vector, record) in old_vectors.into_iter().zip(old_records) {
            if record.document_id != document_id {
                state.vectors.push(vector);
                state.records.push(record);
            }
        }

        let removed = before - state.records.len();
        if removed == 0 {
            debug!(document_id, "no vectors stored for document, nothing to delete");
            return Ok(());
        }

        self.persist(&state).await?;
        info!(
            document_id,
            removed,
            remaining = state.records.len(),
            "rebuilt vector index without document"
        );
        Ok(())
    }

    /// Return a snapshot of index statistics.
    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let total_documents =
            state.records.iter().map(|r| r.document_id).collect::<HashSet<_>>().len();
        IndexStats {
            total_vectors: state.vectors.len(),
            dimension: self.dimension,
            total_documents,
            vectors_file_exists: self.data_dir.join(VECTORS_FILE).exists(),
            metadata_file_exists: self.data_dir.join(METADATA_FILE).exists(),
        }
    }

    /// Embed `text` within the request timeout and normalize the result.
    async fn embed_normalized(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = timeout(self.request_timeout, self.embedder.embed(text))
            .await
            .map_err(|_| RagError::EmbeddingError {
                provider: self.embedder.name().to_string(),
                message: format!("timed out after {:?}", self.request_timeout),
            })??;

        if vector.len() != self.dimension {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.name().to_string(),
                message: format!(
                    "expected {} dimensions, got {}",
                    self.dimension,
                    vector.len()
                ),
            });
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Write both persisted files for the current state.
    async fn persist(&self, state: &IndexState) -> Result<()> {
        let vectors = serde_json::to_vec(&VectorsFileRef {
            version: PERSIST_VERSION,
            dimension: self.dimension,
            vectors: &state.vectors,
        })
        .map_err(|e| RagError::IndexError(format!("failed to encode vectors: {e}")))?;
        let metadata = serde_json::to_vec(&MetadataFileRef {
            version: PERSIST_VERSION,
            records: &state.records,
        })
        .map_err(|e| RagError::IndexError(format!("failed to encode metadata: {e}")))?;

        tokio::fs::write(self.data_dir.join(VECTORS_FILE), vectors)
            .await
            .map_err(|e| RagError::IndexError(format!("failed to write vectors file: {e}")))?;
        tokio::fs::write(self.data_dir.join(METADATA_FILE), metadata)
            .await
            .map_err(|e| RagError::IndexError(format!("failed to write metadata file: {e}")))?;

        debug!(total_vectors = state.vectors.len(), "persisted index files");
        Ok(())
    }
}

/// Inner product of two equal-length vectors.
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn check_alignment(state: &IndexState) -> Result<()> {
    if state.vectors.len() != state.records.len() {
        error!(
            vectors = state.vectors.len(),
            metadata = state.records.len(),
            "vector/metadata alignment violated"
        );
        return Err(RagError::AlignmentViolation {
            vectors: state.vectors.len(),
            metadata: state.records.len(),
        });
    }
    Ok(())
}

/// Load persisted state, resetting to empty when files are missing,
/// unreadable, or misaligned. Incompatible-but-readable files are fatal.
fn load_state(data_dir: &Path, dimension: usize) -> Result<IndexState> {
    let vectors_path = data_dir.join(VECTORS_FILE);
    let metadata_path = data_dir.join(METADATA_FILE);
    if !vectors_path.exists() || !metadata_path.exists() {
        info!(data_dir = %data_dir.display(), "no persisted index found, starting empty");
        return Ok(IndexState::default());
    }

    let vectors_file: VectorsFile = match std::fs::read(&vectors_path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
    {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "failed to load persisted vectors, starting empty");
            return Ok(IndexState::default());
        }
    };
    if vectors_file.version != PERSIST_VERSION {
        return Err(RagError::ConfigError(format!(
            "persisted vectors use schema version {}, expected {PERSIST_VERSION}",
            vectors_file.version
        )));
    }
    if vectors_file.dimension != dimension {
        return Err(RagError::ConfigError(format!(
            "persisted vectors have dimension {}, index is configured for {dimension}",
            vectors_file.dimension
        )));
    }

    let metadata_file: MetadataFile = match std::fs::read(&metadata_path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
    {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "failed to load persisted metadata, starting empty");
            return Ok(IndexState::default());
        }
    };
    if metadata_file.version != PERSIST_VERSION {
        return Err(RagError::ConfigError(format!(
            "persisted metadata uses schema version {}, expected {PERSIST_VERSION}",
            metadata_file.version
        )));
    }

    if vectors_file.vectors.len() != metadata_file.records.len() {
        warn!(
            vectors = vectors_file.vectors.len(),
            metadata = metadata_file.records.len(),
            "persisted files are misaligned, starting empty"
        );
        return Ok(IndexState::default());
    }

    info!(total_vectors = vectors_file.vectors.len(), "loaded persisted vector index");
    Ok(IndexState { vectors: vectors_file.vectors, records: metadata_file.records })
}
