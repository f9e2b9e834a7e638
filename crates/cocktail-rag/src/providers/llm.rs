//! LLM provider trait for chat completions

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// Trait for chat-completion models
///
/// Implementations:
/// - `OpenAiChat`: OpenAI-compatible `/chat/completions` (gpt-4-turbo by default)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a conversation, returning the assistant's reply text
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
