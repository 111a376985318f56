//! Completion provider trait for synthesizing answers from retrieved context.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates text from a system instruction and user prompt.
///
/// Backends should map quota and auth failures to `Ok` strings starting
/// with `[ERROR]` rather than returning `Err`, so callers still receive a
/// well-formed (if degraded) answer. Transport failures may surface as
/// `Err`; [`RagEngine::query`](crate::RagEngine::query) degrades either
/// way and never fails a query because of the completer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the given prompts.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// A short name identifying the backend, used in error messages and logs.
    fn name(&self) -> &'static str {
        "completion"
    }
}

/// A completion provider that never calls a remote service.
///
/// Echoes the user prompt inside a fixed placeholder, which makes engine
/// behavior fully deterministic for offline runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyCompletion;

#[async_trait]
impl CompletionProvider for DummyCompletion {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        Ok(format!(
            "[DUMMY MODE] You asked: '{user_prompt}'. This is a placeholder response generated without calling a language model."
        ))
    }

    fn name(&self) -> &'static str {
        "dummy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dummy_echoes_the_user_prompt() {
        let answer = DummyCompletion.complete("system", "what is rust?").await.unwrap();
        assert!(answer.contains("what is rust?"));
        assert!(answer.starts_with("[DUMMY MODE]"));
    }
}
