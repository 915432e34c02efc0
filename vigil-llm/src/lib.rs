//! VIGIL LLM - Hosted-model abstraction
//!
//! Provider-agnostic completion trait plus the OpenAI-compatible HTTP
//! implementation. The orchestration layer treats every completion call
//! as fallible and slow; a baseline answer must never require one.

use ::async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use vigil_core::{LlmError, VigilError, VigilResult};

pub mod providers;

pub use providers::openai::{OpenAICompletionProvider, OpenAIConfig};

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// One request to the hosted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instruction framing the assistant's role.
    pub system: String,
    /// User prompt: the question plus serialized context.
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: i32,
}

/// Trait for completion providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the request.
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(VigilError::Llm)` - If the call fails or times out
    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String>;

    /// Model identifier this provider calls.
    fn model_id(&self) -> &str;
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

/// Deterministic mock provider for tests and the demo binary.
///
/// Returns canned responses in order, then repeats the last one. With no
/// canned responses it echoes a fixed digest of the prompt. Can be set to
/// fail to exercise fallback paths.
pub struct MockCompletionProvider {
    responses: Vec<String>,
    cursor: AtomicUsize,
    fail: bool,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            cursor: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses,
            cursor: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Provider whose every call fails, for fallback testing.
    pub fn failing() -> Self {
        Self {
            responses: Vec::new(),
            cursor: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
        let call = self.cursor.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(VigilError::Llm(LlmError::RequestFailed {
                provider: "mock".to_string(),
                status: 503,
                message: "mock provider configured to fail".to_string(),
            }));
        }
        if self.responses.is_empty() {
            return Ok(format!(
                "[mock completion] prompt_len={} temperature={}",
                request.prompt.len(),
                request.temperature
            ));
        }
        let idx = call.min(self.responses.len() - 1);
        Ok(self.responses[idx].clone())
    }

    fn model_id(&self) -> &str {
        "mock-completion"
    }
}

impl std::fmt::Debug for MockCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCompletionProvider")
            .field("responses", &self.responses.len())
            .field("fail", &self.fail)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a sensor monitoring assistant.".to_string(),
            prompt: "current status of D100".to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_canned_responses_in_order() {
        let provider = MockCompletionProvider::with_responses(vec![
            "first".to_string(),
            "second".to_string(),
        ]);
        assert_eq!(provider.complete(&request()).await.unwrap(), "first");
        assert_eq!(provider.complete(&request()).await.unwrap(), "second");
        // Repeats the last response once exhausted.
        assert_eq!(provider.complete(&request()).await.unwrap(), "second");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_deterministic_echo() {
        let provider = MockCompletionProvider::new();
        let a = provider.complete(&request()).await.unwrap();
        let b = provider.complete(&request()).await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("prompt_len=22"));
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockCompletionProvider::failing();
        let err = provider.complete(&request()).await;
        assert!(matches!(err, Err(VigilError::Llm(_))));
    }
}
