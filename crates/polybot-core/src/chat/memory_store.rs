//! Process-local session store.
//!
//! Keeps every session and transcript in a `DashMap`. Nothing survives a
//! restart; use the SQLite or PostgREST stores for durability.

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn, window_cutoff};
use polybot_types::error::RepositoryError;

use super::repository::SessionStore;

struct SessionEntry {
    session: Session,
    transcript: Vec<Turn>,
}

/// In-memory implementation of `SessionStore`.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, RepositoryError> {
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionEntry {
                session: Session::new(session_id.clone()),
                transcript: Vec::new(),
            });
        entry.session.last_accessed = Utc::now();
        Ok(entry.session.clone())
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(session_id).map(|e| e.session.clone()))
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
        self.sessions
            .entry(session.id.clone())
            .and_modify(|e| e.session = session.clone())
            .or_insert_with(|| SessionEntry {
                session: session.clone(),
                transcript: Vec::new(),
            });
        Ok(())
    }

    async fn set_language(
        &self,
        session_id: &SessionId,
        language: &str,
    ) -> Result<Session, RepositoryError> {
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionEntry {
                session: Session::new(session_id.clone()),
                transcript: Vec::new(),
            });
        entry.session.language = language.to_string();
        entry.session.last_accessed = Utc::now();
        Ok(entry.session.clone())
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), RepositoryError> {
        // Validate ownership first so a batch is all-or-nothing.
        if turns.iter().any(|t| !self.sessions.contains_key(&t.session_id)) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        for turn in turns {
            let mut entry = self
                .sessions
                .get_mut(&turn.session_id)
                .ok_or(RepositoryError::NotFound)?;
            entry.transcript.push(turn.clone());
            entry.session.last_accessed = now;
        }
        Ok(())
    }

    async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|e| e.transcript.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, RepositoryError> {
        let cutoff = window_cutoff(Utc::now(), window);
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .filter(|e| e.session.last_accessed >= cutoff)
            .map(|e| SessionSummary::from(&e.session))
            .collect();
        summaries.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        Ok(summaries)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        // Turns live inside the entry, so removing it drops them together.
        self.sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn count_sessions(&self) -> Result<u64, RepositoryError> {
        Ok(self.sessions.len() as u64)
    }
}
