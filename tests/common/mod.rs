//! Shared test doubles for the embedding seam.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Once;

use async_trait::async_trait;
use docrag::{Chunk, EmbeddingProvider, RagError, Result};

pub const DIM: usize = 16;

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber once per test binary, honoring
/// `RUST_LOG` for filtering.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Deterministic embedder derived from the text bytes.
///
/// Identical texts map to identical vectors; distinct texts almost surely
/// differ. Vectors are returned un-normalized (the index normalizes).
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dimensions: DIM }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            let slot = (i * 31 + byte as usize) % self.dimensions;
            vector[slot] += f32::from(byte) / 255.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "fake-hash"
    }
}

/// Embedder that returns pre-seeded vectors for exact texts and fails on
/// anything else. Useful for controlling similarity scores precisely and
/// for exercising the mid-batch abort path.
pub struct TableEmbedder {
    pub table: HashMap<String, Vec<f32>>,
    pub dimensions: usize,
}

impl TableEmbedder {
    pub fn new(table: HashMap<String, Vec<f32>>) -> Self {
        Self { table, dimensions: DIM }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table.get(text).cloned().ok_or_else(|| RagError::EmbeddingError {
            provider: "fake-table".to_string(),
            message: format!("no vector seeded for '{text}'"),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "fake-table"
    }
}

/// Build a minimal chunk for index tests.
pub fn make_chunk(index: usize, content: &str) -> Chunk {
    Chunk {
        chunk_index: index,
        content: content.to_string(),
        start_char: index * 32,
        end_char: index * 32 + content.len().max(1),
        word_count: content.split_whitespace().count().max(1),
        page_number: 1,
    }
}
