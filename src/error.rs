//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error (bad chunk sizes, dimensions, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during answer generation.
    ///
    /// This variant never escapes [`RagEngine::query`](crate::RagEngine::query);
    /// the engine converts it into a degraded answer string instead.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the vector index backend (persistence, I/O).
    #[error("Index error: {0}")]
    IndexError(String),

    /// The vector list and metadata list have diverged in length.
    ///
    /// This indicates an internal bug, not a recoverable condition: position
    /// `i` in the vector list must always correspond to metadata entry `i`.
    #[error("Alignment violation: {vectors} vectors but {metadata} metadata records")]
    AlignmentViolation {
        /// Number of stored vectors.
        vectors: usize,
        /// Number of stored metadata records.
        metadata: usize,
    },

    /// An error in the retrieval pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
