//! Retrieval-augmented question answering over uploaded documents.
//!
//! `docrag` provides the core of a document QA pipeline: extracted text is
//! split into overlapping word-window chunks, embedded into a flat
//! cosine-similarity index, and questions are answered by retrieving the
//! most similar chunks and asking a completion provider to synthesize an
//! answer grounded in that context.
//!
//! # Architecture
//!
//! - [`TextChunker`] — overlapping fixed-size word windows with character
//!   offsets and approximate page estimates.
//! - [`EmbeddingProvider`] / [`CompletionProvider`] — async trait seams for
//!   the two external model services; [`DummyCompletion`] runs offline.
//! - [`VectorIndex`] — flat inner-product index with positionally aligned
//!   metadata, persisted as versioned JSON, rebuilt on document deletion.
//! - [`RagEngine`] — retrieve → context → complete → answer with
//!   deduplicated cited sources.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{DummyCompletion, RagConfig, RagEngine, TextChunker, VectorIndex};
//!
//! let config = RagConfig::default();
//! let chunker = TextChunker::from_config(&config)?;
//! let index = Arc::new(VectorIndex::open(&config, embedder)?);
//!
//! let mut chunks = chunker.chunk(&extracted_text);
//! TextChunker::assign_page_numbers(&mut chunks, None);
//! index.add_chunks(&chunks, 42, "report.pdf").await?;
//!
//! let engine = RagEngine::builder()
//!     .index(index)
//!     .completion(Arc::new(DummyCompletion))
//!     .build()?;
//! let result = engine.query("what does the report conclude?", 5).await?;
//! ```

pub mod chunker;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod types;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunker::TextChunker;
pub use completion::{CompletionProvider, DummyCompletion};
pub use config::{RagConfig, RagConfigBuilder};
pub use embedding::{l2_normalize, EmbeddingProvider};
pub use engine::{EngineStatus, RagEngine, RagEngineBuilder};
pub use error::{RagError, Result};
pub use index::VectorIndex;
pub use types::{Chunk, IndexStats, QueryResult, ScoredChunk, Source, VectorRecord};
