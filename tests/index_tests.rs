//! Property and invariant tests for the flat vector index.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{make_chunk, HashEmbedder, TableEmbedder, DIM};
use docrag::{RagConfig, RagError, VectorIndex};
use proptest::prelude::*;

fn test_config(data_dir: &std::path::Path) -> RagConfig {
    common::init_tracing();
    RagConfig::builder()
        .dimension(DIM)
        .data_dir(data_dir)
        .build()
        .unwrap()
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// For any set of stored vectors and any query vector, search results are
/// ordered by descending score, ranks count up from 1, and the result count
/// is bounded by both `k` and the number of stored vectors.
mod prop_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn results_ordered_ranked_and_bounded(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..12),
            query in arb_normalized_embedding(DIM),
            k in 1usize..16,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, stored) = rt.block_on(async {
                let dir = tempfile::tempdir().unwrap();

                let mut table = HashMap::new();
                let mut chunks = Vec::new();
                for (i, embedding) in embeddings.iter().enumerate() {
                    let content = format!("chunk text {i}");
                    table.insert(content.clone(), embedding.clone());
                    chunks.push(make_chunk(i, &content));
                }
                table.insert("query text".to_string(), query.clone());

                let index = VectorIndex::open(
                    &test_config(dir.path()),
                    Arc::new(TableEmbedder::new(table)),
                )
                .unwrap();
                index.add_chunks(&chunks, 1, "doc.txt").await.unwrap();

                (index.search("query text", k).await.unwrap(), chunks.len())
            });

            prop_assert!(results.len() <= k);
            prop_assert!(results.len() <= stored);
            prop_assert_eq!(results.len(), k.min(stored));

            for (i, result) in results.iter().enumerate() {
                prop_assert_eq!(result.rank, i + 1);
            }
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let dir = tempfile::tempdir().unwrap();

    // Two different texts share one vector, so both score identically.
    let mut shared = vec![0.0f32; DIM];
    shared[0] = 1.0;
    let mut table = HashMap::new();
    table.insert("first inserted".to_string(), shared.clone());
    table.insert("second inserted".to_string(), shared.clone());
    table.insert("the query".to_string(), shared);

    let index =
        VectorIndex::open(&test_config(dir.path()), Arc::new(TableEmbedder::new(table))).unwrap();
    index.add_chunks(&[make_chunk(0, "first inserted")], 1, "a.txt").await.unwrap();
    index.add_chunks(&[make_chunk(0, "second inserted")], 2, "b.txt").await.unwrap();

    let results = index.search("the query", 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].record.vector_id, "doc_1_chunk_0");
    assert_eq!(results[1].record.vector_id, "doc_2_chunk_0");
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
    assert!((results[0].score - results[1].score).abs() < 1e-6);
}

#[tokio::test]
async fn search_on_empty_index_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let index =
        VectorIndex::open(&test_config(dir.path()), Arc::new(HashEmbedder::new())).unwrap();

    let results = index.search("anything at all", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn failed_embedding_mid_batch_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();

    // Only the first chunk's text is seeded; the second embed call fails.
    let mut vector = vec![0.0f32; DIM];
    vector[1] = 1.0;
    let mut table = HashMap::new();
    table.insert("seeded chunk".to_string(), vector);

    let index =
        VectorIndex::open(&test_config(dir.path()), Arc::new(TableEmbedder::new(table))).unwrap();
    let chunks = vec![make_chunk(0, "seeded chunk"), make_chunk(1, "unseeded chunk")];

    let err = index.add_chunks(&chunks, 7, "doc.txt").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));

    let stats = index.stats().await;
    assert_eq!(stats.total_vectors, 0);
    assert_eq!(stats.total_documents, 0);
}

#[tokio::test]
async fn unreadable_persisted_files_reset_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vectors.json"), b"not json at all").unwrap();
    std::fs::write(dir.path().join("metadata.json"), b"{}").unwrap();

    let index =
        VectorIndex::open(&test_config(dir.path()), Arc::new(HashEmbedder::new())).unwrap();
    assert_eq!(index.stats().await.total_vectors, 0);
}

#[tokio::test]
async fn persisted_dimension_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("vectors.json"),
        serde_json::json!({ "version": 1, "dimension": DIM * 2, "vectors": [] }).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("metadata.json"),
        serde_json::json!({ "version": 1, "records": [] }).to_string(),
    )
    .unwrap();

    let err =
        VectorIndex::open(&test_config(dir.path()), Arc::new(HashEmbedder::new())).unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test]
async fn persisted_schema_version_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("vectors.json"),
        serde_json::json!({ "version": 99, "dimension": DIM, "vectors": [] }).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("metadata.json"),
        serde_json::json!({ "version": 1, "records": [] }).to_string(),
    )
    .unwrap();

    let err =
        VectorIndex::open(&test_config(dir.path()), Arc::new(HashEmbedder::new())).unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test]
async fn embedder_dimension_must_match_config() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder { dimensions: DIM * 2 });

    let err = VectorIndex::open(&test_config(dir.path()), embedder).unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}
