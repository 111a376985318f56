//! Retrieval-to-generation query orchestrator.
//!
//! [`RagEngine`] composes the [`VectorIndex`] and a [`CompletionProvider`]:
//! it retrieves the most similar chunks for a question, assembles them into
//! a labeled context, asks the completer for an answer grounded in that
//! context, and returns a [`QueryResult`] with deduplicated cited sources.
//!
//! Completion failures never fail a query — the engine substitutes a
//! degraded answer and keeps `context_used` truthful.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info};

use crate::completion::CompletionProvider;
use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::types::{IndexStats, QueryResult, ScoredChunk, Source};

/// Hard upper bound on retrieved chunks per query.
const MAX_TOP_K: usize = 20;

/// Answer returned when retrieval finds nothing, without invoking the completer.
const NO_CONTEXT_ANSWER: &str = "No relevant information found in the indexed documents.";

/// Instruction constraining the completer to the supplied context.
const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions based on the provided context.

Guidelines:
- Use only the information provided in the context to answer the question
- If the context doesn't contain enough information to fully answer the question, clearly state this
- Be accurate and specific
- Cite the sources when possible
- If multiple sources provide different information, acknowledge this
- Keep your response concise but comprehensive";

/// A health snapshot of the engine and its index.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Current vector index statistics.
    pub index: IndexStats,
    /// Coarse service marker.
    pub service_status: &'static str,
}

/// The retrieval-augmented query engine.
///
/// Construct one via [`RagEngine::builder()`].
pub struct RagEngine {
    index: Arc<VectorIndex>,
    completion: Arc<dyn CompletionProvider>,
    request_timeout: Duration,
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Answer a question from indexed document chunks.
    ///
    /// Retrieves up to `k` chunks (clamped to `1..=20`), short-circuiting
    /// with `context_used = false` when the index returns nothing. Otherwise
    /// the retrieved chunks become a labeled context for the completer, and
    /// the result carries every distinct `(filename, page)` source in rank
    /// order. A failed or timed-out completion degrades the answer text but
    /// still returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] when retrieval itself fails
    /// (query embedding or index fault).
    pub async fn query(&self, question: &str, k: usize) -> Result<QueryResult> {
        let k = k.clamp(1, MAX_TOP_K);
        let retrieved = self.index.search(question, k).await.map_err(|e| {
            error!(error = %e, "retrieval failed during query");
            RagError::PipelineError(format!("retrieval failed: {e}"))
        })?;

        if retrieved.is_empty() {
            info!("query retrieved no chunks, skipping completion");
            return Ok(QueryResult {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                context_used: false,
                chunks_retrieved: 0,
            });
        }

        let context = build_context(&retrieved);
        let user_prompt = format!(
            "Context:\n{context}\n\nQuestion: {question}\n\nPlease provide a helpful answer based on the context above."
        );

        let answer = match timeout(
            self.request_timeout,
            self.completion.complete(SYSTEM_PROMPT, &user_prompt),
        )
        .await
        {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                error!(error = %e, "completion failed, returning degraded answer");
                format!("I apologize, but I encountered an error while generating the answer: {e}")
            }
            Err(_) => {
                error!(timeout = ?self.request_timeout, "completion timed out, returning degraded answer");
                let e = RagError::CompletionError {
                    provider: self.completion.name().to_string(),
                    message: format!("timed out after {:?}", self.request_timeout),
                };
                format!("I apologize, but I encountered an error while generating the answer: {e}")
            }
        };

        let sources = collect_sources(&retrieved);
        info!(chunks_retrieved = retrieved.len(), sources = sources.len(), "query completed");

        Ok(QueryResult {
            answer,
            sources,
            context_used: true,
            chunks_retrieved: retrieved.len(),
        })
    }

    /// Report engine health: index statistics plus a service marker.
    pub async fn status(&self) -> EngineStatus {
        EngineStatus { index: self.index.stats().await, service_status: "operational" }
    }
}

/// Format retrieved chunks as labeled context blocks separated by blank lines.
fn build_context(chunks: &[ScoredChunk]) -> String {
    let blocks: Vec<String> = chunks
        .iter()
        .map(|scored| {
            format!(
                "[Source {}: {}, Page {}]\n{}",
                scored.rank, scored.record.filename, scored.record.page_number, scored.record.content
            )
        })
        .collect();
    blocks.join("\n\n")
}

/// Deduplicate sources by `(filename, page)`, keeping first-seen rank order.
fn collect_sources(chunks: &[ScoredChunk]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for scored in chunks {
        let key = (scored.record.filename.clone(), scored.record.page_number);
        if seen.insert(key) {
            sources.push(Source {
                filename: scored.record.filename.clone(),
                page: scored.record.page_number,
                similarity_score: (scored.score * 1000.0).round() / 1000.0,
            });
        }
    }
    sources
}

/// Builder for constructing a [`RagEngine`].
///
/// `index` and `completion` are required; the request timeout defaults to
/// the [`RagConfig`] default.
#[derive(Default)]
pub struct RagEngineBuilder {
    index: Option<Arc<VectorIndex>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    request_timeout: Option<Duration>,
}

impl RagEngineBuilder {
    /// Set the vector index to retrieve from.
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the completion provider used to synthesize answers.
    pub fn completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Set the timeout applied to each completion call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the [`RagEngine`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `index` or `completion` is missing.
    pub fn build(self) -> Result<RagEngine> {
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let completion = self
            .completion
            .ok_or_else(|| RagError::ConfigError("completion is required".to_string()))?;
        let request_timeout =
            self.request_timeout.unwrap_or_else(|| RagConfig::default().request_timeout);

        Ok(RagEngine { index, completion, request_timeout })
    }
}
