//! BoxSessionStore -- object-safe dynamic dispatch wrapper for SessionStore.
//!
//! Same blanket-impl shape as `BoxLlmProvider`:
//! 1. Define an object-safe `SessionStoreDyn` trait with boxed futures
//! 2. Blanket-impl `SessionStoreDyn` for all `T: SessionStore`
//! 3. `BoxSessionStore` wraps `Box<dyn SessionStoreDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chrono::TimeDelta;
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn};
use polybot_types::error::RepositoryError;

use super::repository::SessionStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`SessionStore`] with boxed futures.
pub trait SessionStoreDyn: Send + Sync {
    fn get_or_create_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, Session>;

    fn get_session_boxed<'a>(&'a self, session_id: &'a SessionId)
    -> BoxFuture<'a, Option<Session>>;

    fn save_session_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()>;

    fn set_language_boxed<'a>(
        &'a self,
        session_id: &'a SessionId,
        language: &'a str,
    ) -> BoxFuture<'a, Session>;

    fn append_turns_boxed<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, ()>;

    fn get_transcript_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, Vec<Turn>>;

    fn list_sessions_boxed(&self, window: TimeDelta) -> BoxFuture<'_, Vec<SessionSummary>>;

    fn delete_session_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, ()>;

    fn count_sessions_boxed(&self) -> BoxFuture<'_, u64>;
}

impl<T: SessionStore> SessionStoreDyn for T {
    fn get_or_create_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, Session> {
        Box::pin(self.get_or_create(session_id))
    }

    fn get_session_boxed<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Option<Session>> {
        Box::pin(self.get_session(session_id))
    }

    fn save_session_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()> {
        Box::pin(self.save_session(session))
    }

    fn set_language_boxed<'a>(
        &'a self,
        session_id: &'a SessionId,
        language: &'a str,
    ) -> BoxFuture<'a, Session> {
        Box::pin(self.set_language(session_id, language))
    }

    fn append_turns_boxed<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, ()> {
        Box::pin(self.append_turns(turns))
    }

    fn get_transcript_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, Vec<Turn>> {
        Box::pin(self.get_transcript(session_id))
    }

    fn list_sessions_boxed(&self, window: TimeDelta) -> BoxFuture<'_, Vec<SessionSummary>> {
        Box::pin(self.list_sessions(window))
    }

    fn delete_session_boxed<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, ()> {
        Box::pin(self.delete_session(session_id))
    }

    fn count_sessions_boxed(&self) -> BoxFuture<'_, u64> {
        Box::pin(self.count_sessions())
    }
}

/// Type-erased session store for backend selection at startup.
///
/// `SessionStore` uses RPITIT and cannot be a trait object directly, so the
/// wrapper delegates to `SessionStoreDyn` and implements `SessionStore`
/// itself, letting `ChatService<BoxSessionStore, _>` accept any backend.
pub struct BoxSessionStore {
    inner: Box<dyn SessionStoreDyn>,
}

impl BoxSessionStore {
    pub fn new<T: SessionStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }
}

impl SessionStore for BoxSessionStore {
    async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, RepositoryError> {
        self.inner.get_or_create_boxed(session_id).await
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.inner.get_session_boxed(session_id).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
        self.inner.save_session_boxed(session).await
    }

    async fn set_language(&self, session_id: &SessionId, language: &str) -> Result<Session, RepositoryError> {
        self.inner.set_language_boxed(session_id, language).await
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), RepositoryError> {
        self.inner.append_turns_boxed(turns).await
    }

    async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        self.inner.get_transcript_boxed(session_id).await
    }

    async fn list_sessions(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, RepositoryError> {
        self.inner.list_sessions_boxed(window).await
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        self.inner.delete_session_boxed(session_id).await
    }

    async fn count_sessions(&self) -> Result<u64, RepositoryError> {
        self.inner.count_sessions_boxed().await
    }
}
