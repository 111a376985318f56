//! OpenAI-backed embedding and completion providers.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both providers call the REST endpoints directly via `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default embedding model and its dimensionality.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

/// Default chat model and generation parameters.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1000;

fn api_key_from_env(context: &'static str) -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| RagError::ConfigError(format!(
        "OPENAI_API_KEY environment variable not set ({context})"
    )))
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::openai::OpenAiEmbedder;
///
/// let embedder = OpenAiEmbedder::new("sk-...")?;
/// let embedding = embedder.embed("hello world").await?;
/// ```
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    /// Create a new embedder with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: "openai".into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create an embedder using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("required by OpenAiEmbedder")?)
    }

    /// Set the embedding model (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka truncation).
    ///
    /// When set, the API returns embeddings truncated to this size. This
    /// also updates the value reported by
    /// [`dimensions()`](EmbeddingProvider::dimensions), so the embedder can
    /// pair with an index configured for a non-default dimension.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: "openai".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.model, "embedding batch via OpenAI");

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts.to_vec(),
                dimensions: self.request_dimensions,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "embedding request failed");
                RagError::EmbeddingError {
                    provider: "openai".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "embedding API error");
            return Err(RagError::EmbeddingError {
                provider: "openai".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingError {
                provider: "openai".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}


/// A [`CompletionProvider`] backed by the OpenAI chat completions API.
///
/// Quota and other API rejections come back as `Ok` strings tagged with
/// `[ERROR]` so that callers still receive a well-formed answer; only
/// transport failures surface as `Err`.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiCompleter {
    /// Create a new completer with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::CompletionError {
                provider: "openai".into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self { client: reqwest::Client::new(), api_key, model: DEFAULT_CHAT_MODEL.into() })
    }

    /// Create a completer using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("required by OpenAiCompleter")?)
    }

    /// Set the chat model (e.g. `gpt-4o-mini`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl CompletionProvider for OpenAiCompleter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = user_prompt.len(), "requesting chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "completion request failed");
                RagError::CompletionError {
                    provider: "openai".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("completion quota exceeded, returning tagged placeholder");
            return Ok(
                "[ERROR] Completion quota exceeded. Use the dummy completion provider to run offline."
                    .to_string(),
            );
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "completion API error");
            return Ok(format!("[ERROR] Completion API returned {status}: {detail}"));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            RagError::CompletionError {
                provider: "openai".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        chat_response.choices.into_iter().next().map(|c| c.message.content).ok_or_else(|| {
            RagError::CompletionError {
                provider: "openai".into(),
                message: "API returned no choices".into(),
            }
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
