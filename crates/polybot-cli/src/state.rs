//! Application state wiring the chat service together.
//!
//! The service is generic over store and provider; AppState pins both to
//! the boxed backends chosen from configuration at startup.

use std::path::PathBuf;
use std::sync::Arc;

use polybot_core::chat::box_store::BoxSessionStore;
use polybot_core::chat::service::{ChatService, ChatSettings};
use polybot_core::llm::box_provider::BoxLlmProvider;
use polybot_core::llm::provider::LlmProvider;
use polybot_infra::config::{Secrets, load_config, resolve_data_dir};
use polybot_infra::llm::create_provider;
use polybot_infra::store::open_store;
use polybot_types::config::AppConfig;
use polybot_types::llm::{CompletionRequest, CompletionResponse, LlmError};

pub type ConcreteChatService = ChatService<BoxSessionStore, BoxLlmProvider>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub config: AppConfig,
    pub data_dir: PathBuf,
    /// Why the model cannot be reached, if it cannot.
    pub model_unavailable: Option<String>,
}

impl AppState {
    /// Load configuration, open the store, and build the model provider.
    ///
    /// A missing API key is not fatal here: session management works
    /// without a model, so only `chat` and `send` refuse to start.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        let secrets = Secrets::from_env();

        let store = open_store(&config.store, &data_dir, secrets.store_key.as_ref()).await?;

        let (provider, model_unavailable) =
            match create_provider(&config.llm, secrets.openai_api_key) {
                Ok(provider) => (provider, None),
                Err(err) => {
                    tracing::debug!(error = %err, "Model provider unavailable");
                    let reason = match err {
                        LlmError::AuthenticationFailed => {
                            "no API key found; set OPENAI_API_KEY in the environment or a .env file".to_string()
                        }
                        other => other.to_string(),
                    };
                    (BoxLlmProvider::new(UnavailableProvider), Some(reason))
                }
            };

        let settings = ChatSettings::from_config(&config);
        let chat_service = ChatService::new(store, provider, settings);

        Ok(Self {
            chat_service: Arc::new(chat_service),
            config,
            data_dir,
            model_unavailable,
        })
    }

    /// Fail early when a command needs the model and none is configured.
    pub fn require_model(&self) -> anyhow::Result<()> {
        match &self.model_unavailable {
            Some(reason) => anyhow::bail!("cannot reach the model: {reason}"),
            None => Ok(()),
        }
    }
}

/// Stand-in provider used when no API key is configured.
struct UnavailableProvider;

impl LlmProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthenticationFailed)
    }
}
