//! SessionStore trait definition.
//!
//! Provides session and transcript persistence. Implemented by the in-memory
//! store in this crate and by the SQLite and PostgREST stores in polybot-infra.

use chrono::TimeDelta;
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn};
use polybot_types::error::RepositoryError;

/// Repository trait for sessions and their transcripts.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionStore: Send + Sync {
    /// Return the session, creating it with the default language if absent.
    ///
    /// Never resets an existing transcript. Refreshes `last_accessed`.
    fn get_or_create(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Get a session without creating or touching it.
    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Insert or overwrite every field of a session record.
    fn save_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Upsert the language preference, creating the session if absent.
    fn set_language(
        &self,
        session_id: &SessionId,
        language: &str,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Append turns in slice order and refresh each owning session's
    /// `last_accessed`.
    ///
    /// Returns `RepositoryError::NotFound` if an owning session does not exist.
    fn append_turns(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get the transcript in chronological order. Unknown sessions are empty.
    fn get_transcript(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    /// Sessions accessed within the trailing `window`, most recent first.
    fn list_sessions(
        &self,
        window: TimeDelta,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, RepositoryError>> + Send;

    /// Delete a session and all of its turns.
    ///
    /// Returns `RepositoryError::NotFound` if the session does not exist.
    fn delete_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Count all sessions regardless of recency.
    fn count_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
