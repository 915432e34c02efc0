//! OpenAI-compatible provider implementation

pub mod client;
pub mod completion;
pub mod types;

pub use client::OpenAIClient;
pub use completion::{OpenAICompletionProvider, OpenAIConfig};
