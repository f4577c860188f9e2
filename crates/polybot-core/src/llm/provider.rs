//! LlmProvider trait definition.
//!
//! This is the core abstraction that model backends implement. Uses RPITIT
//! for `complete`; `BoxLlmProvider` adds dynamic dispatch on top.

use polybot_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends (OpenAI, Mistral, ...).
///
/// Implementations live in polybot-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
