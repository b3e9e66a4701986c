//! LLM integration for Daily Coach.
//!
//! Supports:
//! - **OpenAI**: chat-completion API with native function calling
//! - **Gemini**: generative-content API with function-call parts
//!
//! Both backends sit behind the `ChatProvider` trait; the orchestrator never
//! branches on provider identity.

pub mod gemini;
pub mod message;
pub mod openai;

pub use gemini::GeminiProvider;
pub use message::{
    ChatMessage, Role, ToolCall, ToolDefinition, ToolResult, tool_results_paired,
};
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Sentinel text for a backend turn that produced neither text nor a tool
/// call.
pub const NO_RESPONSE: &str = "(sin respuesta)";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Gemini,
}

/// Configuration for creating a provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub backend: Backend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Tool-choice policy for a single backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// Tools are declared for schema validity but must not be called.
    /// Used on the follow-up call so it produces a final answer.
    None,
}

/// One backend call: ordered messages, advertised tools, choice policy.
///
/// The first message must be `Role::System`; adapters rely on it.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            messages,
            tools,
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }
}

/// What a backend call produced.
///
/// If `tool_call` is present, `text` may be empty. Otherwise `text` is
/// non-empty (adapters substitute [`NO_RESPONSE`] when the backend returns
/// nothing). At most one tool call is ever surfaced; adapters drop the rest.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub text: String,
    pub tool_call: Option<ToolCall>,
}

/// A chat backend able to complete a conversation with tool support.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Model identifier this provider was configured with.
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<ProviderReply, ProviderError>;
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Arc<dyn ChatProvider> {
    match config.backend {
        Backend::OpenAi => {
            tracing::info!(model = %config.model, "Using OpenAI backend");
            Arc::new(OpenAiProvider::new(config.api_key.clone(), &config.model))
        }
        Backend::Gemini => {
            tracing::info!(model = %config.model, "Using Gemini backend");
            Arc::new(GeminiProvider::new(config.api_key.clone(), &config.model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_openai() {
        let config = ProviderConfig {
            backend: Backend::OpenAi,
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o-mini".to_string(),
        };
        let provider = create_provider(&config);
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_create_provider_gemini() {
        let config = ProviderConfig {
            backend: Backend::Gemini,
            api_key: secrecy::SecretString::from("test-key"),
            model: "gemini-1.5-flash".to_string(),
        };
        let provider = create_provider(&config);
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-1.5-flash");
    }
}
