//! Chat-completion provider over the OpenAI-compatible client

use super::client::OpenAIClient;
use super::types::{ChatRequest, ChatResponse, Message};
use crate::providers::invalid_response;
use crate::{CompletionProvider, CompletionRequest};
use ::async_trait::async_trait;
use vigil_core::VigilResult;

/// Configuration for the hosted completion provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub requests_per_minute: u32,
    /// Alternative OpenAI-compatible endpoint, if any.
    pub base_url: Option<String>,
}

impl OpenAIConfig {
    /// Read configuration from environment variables.
    ///
    /// - `OPENAI_API_KEY`: required for live use
    /// - `VIGIL_LLM_MODEL`: model identifier (default "gpt-4o-mini")
    /// - `VIGIL_LLM_BASE_URL`: alternative endpoint
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            model: std::env::var("VIGIL_LLM_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            requests_per_minute: 60,
            base_url: std::env::var("VIGIL_LLM_BASE_URL").ok(),
        })
    }
}

/// Completion provider backed by the chat-completions endpoint.
#[derive(Debug)]
pub struct OpenAICompletionProvider {
    client: OpenAIClient,
    model: String,
}

impl OpenAICompletionProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        let mut client = OpenAIClient::new(config.api_key, config.requests_per_minute);
        if let Some(base_url) = config.base_url {
            client = client.with_base_url(base_url);
        }
        Self {
            client,
            model: config.model,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        tracing::debug!(model = %self.model, prompt_len = request.prompt.len(), "completion request");

        let response: ChatResponse = self.client.request("chat/completions", body).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response("openai", "response contained no choices"))?;

        Ok(choice.message.content.trim().to_string())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
