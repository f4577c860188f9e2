//! Configuration and secret loading for PolyBot.
//!
//! Settings come from `{data_dir}/config.toml` (falling back to defaults
//! when missing or malformed) with environment overrides on top. The three
//! secrets (model API key, store URL, store key) only ever come from the
//! environment, optionally seeded from `.env` files.

use std::path::{Path, PathBuf};

use polybot_types::config::AppConfig;
use secrecy::SecretString;

pub const ENV_DATA_DIR: &str = "POLYBOT_DATA_DIR";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_STORE_URL: &str = "POLYBOT_STORE_URL";
pub const ENV_STORE_KEY: &str = "POLYBOT_STORE_KEY";

/// Resolve the data directory.
///
/// 1. `POLYBOT_DATA_DIR`
/// 2. `~/.polybot`
/// 3. `./.polybot`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".polybot");
    }
    PathBuf::from(".polybot")
}

/// Load `.env` from the working directory, then from the data directory.
///
/// Variables already set in the process environment are never overwritten,
/// so the working directory file wins over the data directory one.
pub fn load_env_files() {
    dotenv::dotenv().ok();
    dotenv::from_path(resolve_data_dir().join(".env")).ok();
}

/// Load `{data_dir}/config.toml` and apply environment overrides.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let mut config = read_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            AppConfig::default()
        }
    }
}

/// Environment values that override the file.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_STORE_URL).filter(|v| !v.is_empty()) {
        config.store.url = Some(url);
    }
}

/// Secrets read from the environment. Never printed.
pub struct Secrets {
    pub openai_api_key: Option<SecretString>,
    pub store_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secret = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(SecretString::from);
        Self {
            openai_api_key: secret(ENV_OPENAI_API_KEY),
            store_key: secret(ENV_STORE_KEY),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("store_key", &self.store_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
