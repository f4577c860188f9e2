//! LLM provider implementations.
//!
//! [`create_provider`] builds the configured backend behind a
//! [`BoxLlmProvider`] so the CLI can choose it at runtime.

pub mod openai_compat;

use secrecy::SecretString;

use polybot_core::llm::box_provider::BoxLlmProvider;
use polybot_types::config::LlmConfig;
use polybot_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::{OpenAiCompatConfig, known_base_url};

/// Create a [`BoxLlmProvider`] from the `[llm]` config section.
///
/// An explicit `base_url` wins; otherwise the provider name must be a
/// well-known one. Fails with `AuthenticationFailed` when no key is set.
pub fn create_provider(config: &LlmConfig, api_key: Option<SecretString>) -> Result<BoxLlmProvider, LlmError> {
    let api_key = api_key.ok_or(LlmError::AuthenticationFailed)?;

    let base_url = match config.base_url.as_deref() {
        Some(url) => url.to_string(),
        None => known_base_url(&config.provider)
            .ok_or_else(|| {
                LlmError::InvalidRequest(format!(
                    "unknown provider '{}' needs an explicit base_url",
                    config.provider
                ))
            })?
            .to_string(),
    };

    tracing::debug!(provider = %config.provider, model = %config.model, %base_url, "Creating LLM provider");

    let provider = OpenAiCompatibleProvider::new(OpenAiCompatConfig {
        provider_name: config.provider.clone(),
        base_url,
        api_key,
        model: config.model.clone(),
    });
    Ok(BoxLlmProvider::new(provider))
}
