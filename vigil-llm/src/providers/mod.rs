//! Completion provider implementations
//!
//! Concrete implementations of the CompletionProvider trait for hosted
//! model services.

pub mod openai;

pub use openai::{OpenAIClient, OpenAICompletionProvider};

use vigil_core::{LlmError, VigilError};

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> VigilError {
    VigilError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> VigilError {
    VigilError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> VigilError {
    VigilError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
