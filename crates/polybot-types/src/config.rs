//! Configuration types for PolyBot.
//!
//! `AppConfig` represents `config.toml` in the data directory. Every field
//! has a default so an empty or missing file yields a working setup.
//! Secrets (API keys) are never part of this struct; they come from the
//! environment and are resolved in polybot-infra.

use serde::{Deserialize, Serialize};

use crate::chat::DEFAULT_RECENCY_WINDOW_DAYS;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Which session store backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; lost on restart.
    Memory,
    /// Local SQLite database.
    #[default]
    Sqlite,
    /// Remote relational store exposed over PostgREST.
    Postgrest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite URL or PostgREST base URL. `POLYBOT_STORE_URL` takes precedence.
    #[serde(default)]
    pub url: Option<String>,
    /// Upper bound for a single store operation.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_store_timeout_secs() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name ("openai", "mistral", ...). Unknown names need `base_url`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Upper bound for one model invocation.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            max_tokens: None,
            temperature: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// What to do when a turn cannot be written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Keep the exchange going and report the failure alongside the reply.
    #[default]
    BestEffort,
    /// Abort the exchange with the persistence error.
    Strict,
}

/// Which language instruction wraps replayed turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayLanguage {
    /// Every turn is re-wrapped with the session's current language.
    #[default]
    Current,
    /// Each turn keeps the language recorded with it; the current language
    /// applies only to turns recorded without one.
    PerTurn,
}

/// How transcript roles are presented to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayRoles {
    /// Every turn, including earlier assistant replies, is sent as a
    /// language-wrapped user message.
    #[default]
    AllUser,
    /// Assistant turns are sent unwrapped with the assistant role.
    Preserve,
}

/// Prompt construction settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPolicy {
    #[serde(default)]
    pub language: ReplayLanguage,
    #[serde(default)]
    pub roles: ReplayRoles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Trailing window for session listings.
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    #[serde(default)]
    pub persistence: PersistencePolicy,
    #[serde(default)]
    pub replay_language: ReplayLanguage,
    #[serde(default)]
    pub replay_roles: ReplayRoles,
}

fn default_recency_window_days() -> i64 {
    DEFAULT_RECENCY_WINDOW_DAYS
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            recency_window_days: default_recency_window_days(),
            persistence: PersistencePolicy::default(),
            replay_language: ReplayLanguage::default(),
            replay_roles: ReplayRoles::default(),
        }
    }
}

impl ChatConfig {
    pub fn prompt_policy(&self) -> PromptPolicy {
        PromptPolicy {
            language: self.replay_language,
            roles: self.replay_roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.timeout_secs, 10);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.chat.recency_window_days, 7);
        assert_eq!(config.chat.persistence, PersistencePolicy::BestEffort);
        assert_eq!(config.chat.prompt_policy(), PromptPolicy::default());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
[store]
backend = "postgrest"
url = "https://db.example.com"

[chat]
persistence = "strict"
replay_language = "per_turn"
replay_roles = "preserve"
"#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Postgrest);
        assert_eq!(config.store.url.as_deref(), Some("https://db.example.com"));
        assert_eq!(config.store.timeout_secs, 10);
        assert_eq!(config.chat.persistence, PersistencePolicy::Strict);
        assert_eq!(config.chat.replay_language, ReplayLanguage::PerTurn);
        assert_eq!(config.chat.replay_roles, ReplayRoles::Preserve);
        assert_eq!(config.llm, LlmConfig::default());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = toml::from_str::<AppConfig>("[store]\nbackend = \"redis\"\n");
        assert!(result.is_err());
    }
}
