//! Configuration and per-provider defaults for OpenAI-compatible providers.
//!
//! Each well-known provider speaking the chat completions protocol gets a
//! factory returning an [`OpenAiCompatConfig`] with its base URL filled in.

use secrecy::SecretString;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Configuration for an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai", "mistral").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves `model` empty.
    pub model: String,
}

fn defaults(provider_name: &str, base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: provider_name.into(),
        base_url: base_url.into(),
        api_key,
        model: model.into(),
    }
}

pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    defaults("openai", OPENAI_BASE_URL, api_key, model)
}

pub fn mistral_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    defaults("mistral", MISTRAL_BASE_URL, api_key, model)
}

pub fn gemini_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    defaults("gemini", GEMINI_BASE_URL, api_key, model)
}

/// Base URL for a well-known provider name.
pub fn known_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some(OPENAI_BASE_URL),
        "mistral" => Some(MISTRAL_BASE_URL),
        "gemini" => Some(GEMINI_BASE_URL),
        _ => None,
    }
}
