//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `polybot-core` over the `sessions` and
//! `history` tables. Raw queries, private Row structs, reads on the reader
//! pool and writes on the single-connection writer pool.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use polybot_core::chat::repository::SessionStore;
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn, TurnRole, window_cutoff};
use polybot_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    session_id: String,
    name: Option<String>,
    language: String,
    created_at: String,
    last_accessed: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            name: row.try_get("name")?,
            language: row.try_get("language")?,
            created_at: row.try_get("created_at")?,
            last_accessed: row.try_get("last_accessed")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        Ok(Session {
            id: SessionId::from(self.session_id),
            name: self.name,
            language: self.language,
            created_at: parse_datetime(&self.created_at)?,
            last_accessed: parse_datetime(&self.last_accessed)?,
        })
    }
}

struct HistoryRow {
    session_id: String,
    role: String,
    message: String,
    language: Option<String>,
    timestamp: String,
}

impl HistoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            message: row.try_get("message")?,
            language: row.try_get("language")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_turn(self) -> Result<Turn, RepositoryError> {
        let role: TurnRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Turn {
            session_id: SessionId::from(self.session_id),
            role,
            content: self.message,
            language: self.language,
            created_at: parse_datetime(&self.timestamp)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps so lexicographic order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection(err.to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

fn session_from(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    SessionRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_session()
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let row = sqlx::query(
            r#"INSERT INTO sessions (session_id, name, language, created_at, last_accessed)
               VALUES (?, NULL, ?, ?, ?)
               ON CONFLICT(session_id) DO UPDATE SET last_accessed = excluded.last_accessed
               RETURNING *"#,
        )
        .bind(session_id.as_str())
        .bind(polybot_types::chat::DEFAULT_LANGUAGE)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        session_from(&row)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(session_from).transpose()
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (session_id, name, language, created_at, last_accessed)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(session_id) DO UPDATE SET
                   name = excluded.name,
                   language = excluded.language,
                   created_at = excluded.created_at,
                   last_accessed = excluded.last_accessed"#,
        )
        .bind(session.id.as_str())
        .bind(&session.name)
        .bind(&session.language)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.last_accessed))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn set_language(&self, session_id: &SessionId, language: &str) -> Result<Session, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let row = sqlx::query(
            r#"INSERT INTO sessions (session_id, name, language, created_at, last_accessed)
               VALUES (?, NULL, ?, ?, ?)
               ON CONFLICT(session_id) DO UPDATE SET
                   language = excluded.language,
                   last_accessed = excluded.last_accessed
               RETURNING *"#,
        )
        .bind(session_id.as_str())
        .bind(language)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        session_from(&row)
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), RepositoryError> {
        if turns.is_empty() {
            return Ok(());
        }

        // One transaction so a batch is all-or-nothing.
        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_error)?;
        let now = format_datetime(&Utc::now());

        for turn in turns {
            let touched = sqlx::query("UPDATE sessions SET last_accessed = ? WHERE session_id = ?")
                .bind(&now)
                .bind(turn.session_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

            if touched.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }

            sqlx::query(
                r#"INSERT INTO history (session_id, role, message, language, timestamp)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(turn.session_id.as_str())
            .bind(turn.role.to_string())
            .bind(&turn.content)
            .bind(&turn.language)
            .bind(format_datetime(&turn.created_at))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM history WHERE session_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            let history_row =
                HistoryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            turns.push(history_row.into_turn()?);
        }

        Ok(turns)
    }

    async fn list_sessions(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, RepositoryError> {
        let cutoff = format_datetime(&window_cutoff(Utc::now(), window));
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE last_accessed >= ? ORDER BY last_accessed DESC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionSummary::from(session_from(row)?));
        }

        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM history WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn count_sessions(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM sessions")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteSessionStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        SqliteSessionStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    fn user(session: &str, text: &str) -> Turn {
        Turn::new(sid(session), TurnRole::User, text, Some("English".into()))
    }

    #[tokio::test]
    async fn test_get_or_create_keeps_existing_session() {
        let store = test_store().await;
        let created = store.get_or_create(&sid("a")).await.unwrap();
        assert_eq!(created.language, "English");
        assert!(created.name.is_none());

        store.set_language(&sid("a"), "French").await.unwrap();
        store.append_turns(&[user("a", "hello")]).await.unwrap();

        let again = store.get_or_create(&sid("a")).await.unwrap();
        assert_eq!(again.language, "French");
        assert_eq!(again.created_at, created.created_at);
        assert_eq!(store.get_transcript(&sid("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_session_missing() {
        let store = test_store().await;
        assert!(store.get_session(&sid("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_language_creates_session() {
        let store = test_store().await;
        let session = store.set_language(&sid("new"), "Klingon").await.unwrap();
        assert_eq!(session.language, "Klingon");
        assert_eq!(store.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_session_overwrites_name() {
        let store = test_store().await;
        let mut session = store.get_or_create(&sid("a")).await.unwrap();
        session.name = Some("Groceries".into());
        store.save_session(&session).await.unwrap();

        let loaded = store.get_session(&sid("a")).await.unwrap().unwrap();
        assert_eq!(loaded.name.as_deref(), Some("Groceries"));
    }

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let store = test_store().await;
        store.get_or_create(&sid("a")).await.unwrap();

        let turns = vec![
            user("a", "first"),
            Turn::new(sid("a"), TurnRole::Assistant, "second", Some("English".into())),
            user("a", "third"),
        ];
        store.append_turns(&turns).await.unwrap();

        let transcript = store.get_transcript(&sid("a")).await.unwrap();
        let contents: Vec<&str> = transcript.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(transcript[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn test_same_timestamp_falls_back_to_insertion_order() {
        let store = test_store().await;
        store.get_or_create(&sid("a")).await.unwrap();

        let at = Utc::now();
        let mut a = user("a", "one");
        let mut b = user("a", "two");
        a.created_at = at;
        b.created_at = at;
        store.append_turns(&[a, b]).await.unwrap();

        let transcript = store.get_transcript(&sid("a")).await.unwrap();
        assert_eq!(transcript[0].content, "one");
        assert_eq!(transcript[1].content, "two");
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_writes_nothing() {
        let store = test_store().await;
        store.get_or_create(&sid("a")).await.unwrap();

        let result = store
            .append_turns(&[user("a", "kept?"), user("ghost", "orphan")])
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert!(store.get_transcript(&sid("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_session_cascades_history() {
        let store = test_store().await;
        store.get_or_create(&sid("a")).await.unwrap();
        store.get_or_create(&sid("b")).await.unwrap();
        store.append_turns(&[user("a", "x"), user("b", "y")]).await.unwrap();

        store.delete_session(&sid("a")).await.unwrap();

        assert!(store.get_session(&sid("a")).await.unwrap().is_none());
        assert!(store.get_transcript(&sid("a")).await.unwrap().is_empty());
        assert_eq!(store.get_transcript(&sid("b")).await.unwrap().len(), 1);
        assert_eq!(store.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_session() {
        let store = test_store().await;
        let result = store.delete_session(&sid("nope")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_sessions_respects_window() {
        let store = test_store().await;
        let now = Utc::now();
        for (id, days) in [("today", 0), ("six", 6), ("eight", 8)] {
            let mut session = Session::new(sid(id));
            session.last_accessed = now - TimeDelta::days(days);
            store.save_session(&session).await.unwrap();
        }

        let listed = store.list_sessions(TimeDelta::days(7)).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["today", "six"]);
        assert_eq!(store.count_sessions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_sessions_with_huge_window_lists_everything() {
        let store = test_store().await;
        let mut session = Session::new(sid("ancient"));
        session.last_accessed = Utc::now() - TimeDelta::days(3650);
        store.save_session(&session).await.unwrap();

        let listed = store.list_sessions(TimeDelta::days(200_000_000)).await;
        assert_eq!(listed.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_refreshes_last_accessed() {
        let store = test_store().await;
        let mut session = Session::new(sid("old"));
        session.last_accessed = Utc::now() - TimeDelta::days(30);
        store.save_session(&session).await.unwrap();
        assert!(store.list_sessions(TimeDelta::days(7)).await.unwrap().is_empty());

        store.append_turns(&[user("old", "back again")]).await.unwrap();
        assert_eq!(store.list_sessions(TimeDelta::days(7)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_text_is_stored_verbatim() {
        let store = test_store().await;
        store.get_or_create(&sid("a")).await.unwrap();
        let text = "Respond in French: already prefixed? 'quotes' \"double\"";
        store.append_turns(&[user("a", text)]).await.unwrap();
        assert_eq!(store.get_transcript(&sid("a")).await.unwrap()[0].content, text);
    }
}
