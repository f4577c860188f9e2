//! Session store selection.
//!
//! Opens the backend named by `[store].backend` behind a `BoxSessionStore`.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use polybot_core::chat::box_store::BoxSessionStore;
use polybot_core::chat::memory_store::InMemorySessionStore;
use polybot_types::config::{StoreBackend, StoreConfig};
use polybot_types::error::RepositoryError;

use crate::postgrest::PostgrestSessionStore;
use crate::sqlite::pool::{DatabasePool, database_url};
use crate::sqlite::session::SqliteSessionStore;

/// Open the configured session store.
///
/// SQLite defaults to `{data_dir}/polybot.db`, creating the directory if
/// needed. PostgREST requires both a URL and an access key.
pub async fn open_store(
    config: &StoreConfig,
    data_dir: &Path,
    store_key: Option<&SecretString>,
) -> Result<BoxSessionStore, RepositoryError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; sessions are lost on exit");
            Ok(BoxSessionStore::new(InMemorySessionStore::new()))
        }
        StoreBackend::Sqlite => {
            let url = match config.url.as_deref() {
                Some(url) => url.to_string(),
                None => {
                    tokio::fs::create_dir_all(data_dir)
                        .await
                        .map_err(|e| RepositoryError::Connection(format!("cannot create {}: {e}", data_dir.display())))?;
                    database_url(data_dir)
                }
            };
            tracing::debug!(%url, "Opening SQLite store");
            let pool = DatabasePool::new(&url)
                .await
                .map_err(|e| RepositoryError::Connection(e.to_string()))?;
            Ok(BoxSessionStore::new(SqliteSessionStore::new(pool)))
        }
        StoreBackend::Postgrest => {
            let url = config.url.as_deref().ok_or_else(|| {
                RepositoryError::Connection("postgrest store needs POLYBOT_STORE_URL or [store].url".to_string())
            })?;
            let key = store_key.ok_or_else(|| {
                RepositoryError::Connection("postgrest store needs POLYBOT_STORE_KEY".to_string())
            })?;
            tracing::debug!(%url, "Using PostgREST store");
            let store = PostgrestSessionStore::new(url, key, Duration::from_secs(config.timeout_secs))?;
            Ok(BoxSessionStore::new(store))
        }
    }
}
