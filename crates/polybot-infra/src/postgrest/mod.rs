//! Remote session store over a PostgREST endpoint (e.g. a Supabase project).
//!
//! Expects `sessions` and `history` tables shaped like the SQLite schema in
//! `migrations/`, with `history.session_id` referencing `sessions`. Every
//! request carries the access key both as `apikey` and as a bearer token.

mod record;

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{SecondsFormat, TimeDelta, Utc};
use polybot_core::chat::repository::SessionStore;
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn, window_cutoff};
use polybot_types::error::RepositoryError;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use self::record::{HistoryRecord, PostgrestErrorBody, SessionRecord};

const SESSIONS: &str = "sessions";
const HISTORY: &str = "history";

/// Postgres error code for a foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// `SessionStore` backed by PostgREST.
///
/// Does not derive Debug; the client's default headers hold the access key.
pub struct PostgrestSessionStore {
    client: reqwest::Client,
    base_url: String,
}

impl PostgrestSessionStore {
    /// Build a store for `base_url` (e.g. `https://<project>.supabase.co/rest/v1`).
    pub fn new(base_url: &str, api_key: &SecretString, timeout: Duration) -> Result<Self, RepositoryError> {
        let key = api_key.expose_secret();

        let mut apikey = HeaderValue::from_str(key)
            .map_err(|e| RepositoryError::Connection(format!("invalid store key: {e}")))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| RepositoryError::Connection(format!("invalid store key: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    fn eq_session(session_id: &SessionId) -> (&'static str, String) {
        ("session_id", format!("eq.{session_id}"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RepositoryError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RepositoryError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RepositoryError::Query(format!("malformed response: {e}")))
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let records: Vec<SessionRecord> = self
            .send_json(
                self.client
                    .get(self.table(SESSIONS))
                    .query(&[Self::eq_session(session_id), ("select", "*".to_string())]),
            )
            .await?;
        Ok(records.into_iter().next().map(SessionRecord::into_session))
    }

    /// PATCH the session row and return the updated record, if any.
    async fn patch_session(
        &self,
        session_id: &SessionId,
        body: serde_json::Value,
    ) -> Result<Option<Session>, RepositoryError> {
        let records: Vec<SessionRecord> = self
            .send_json(
                self.client
                    .patch(self.table(SESSIONS))
                    .query(&[Self::eq_session(session_id)])
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        Ok(records.into_iter().next().map(SessionRecord::into_session))
    }

    /// Insert `session` unless a row already exists; returns the stored row.
    async fn insert_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        let records: Vec<SessionRecord> = self
            .send_json(
                self.client
                    .post(self.table(SESSIONS))
                    .query(&[("on_conflict", "session_id")])
                    .header("Prefer", "resolution=ignore-duplicates,return=representation")
                    .json(&[SessionRecord::from(session)]),
            )
            .await?;

        match records.into_iter().next() {
            Some(record) => Ok(record.into_session()),
            // Lost a race with a concurrent insert; read the winner.
            None => self
                .fetch_session(&session.id)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_reqwest_error(err: reqwest::Error) -> RepositoryError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        RepositoryError::Connection(err.to_string())
    } else {
        RepositoryError::Query(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: PostgrestErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body.message.unwrap_or_else(|| text.clone());

    Err(match status {
        StatusCode::CONFLICT if body.code.as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            RepositoryError::NotFound
        }
        StatusCode::CONFLICT => RepositoryError::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RepositoryError::Connection(format!("store rejected credentials ({status}): {message}"))
        }
        s if s.is_server_error() => RepositoryError::Connection(format!("{status}: {message}")),
        _ => RepositoryError::Query(format!("{status}: {message}")),
    })
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

impl SessionStore for PostgrestSessionStore {
    async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, RepositoryError> {
        let touched = self
            .patch_session(session_id, serde_json::json!({ "last_accessed": now_string() }))
            .await?;
        match touched {
            Some(session) => Ok(session),
            None => self.insert_session(&Session::new(session_id.clone())).await,
        }
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.fetch_session(session_id).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
        self.send(
            self.client
                .post(self.table(SESSIONS))
                .query(&[("on_conflict", "session_id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&[SessionRecord::from(session)]),
        )
        .await?;
        Ok(())
    }

    async fn set_language(&self, session_id: &SessionId, language: &str) -> Result<Session, RepositoryError> {
        let body = serde_json::json!({ "language": language, "last_accessed": now_string() });
        if let Some(session) = self.patch_session(session_id, body).await? {
            return Ok(session);
        }

        let mut session = Session::new(session_id.clone());
        session.language = language.to_string();
        self.save_session(&session).await?;
        Ok(session)
    }

    async fn append_turns(&self, turns: &[Turn]) -> Result<(), RepositoryError> {
        if turns.is_empty() {
            return Ok(());
        }

        // A bulk insert is a single statement, so the batch is all-or-nothing.
        let records: Vec<HistoryRecord> = turns.iter().map(HistoryRecord::from).collect();
        self.send(
            self.client
                .post(self.table(HISTORY))
                .header("Prefer", "return=minimal")
                .json(&records),
        )
        .await?;

        let owners: BTreeSet<&SessionId> = turns.iter().map(|t| &t.session_id).collect();
        let now = now_string();
        for owner in owners {
            self.patch_session(owner, serde_json::json!({ "last_accessed": now.as_str() }))
                .await?;
        }
        Ok(())
    }

    async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
        let records: Vec<HistoryRecord> = self
            .send_json(self.client.get(self.table(HISTORY)).query(&[
                Self::eq_session(session_id),
                ("select", "*".to_string()),
                ("order", "timestamp.asc,id.asc".to_string()),
            ]))
            .await?;
        Ok(records.into_iter().map(HistoryRecord::into_turn).collect())
    }

    async fn list_sessions(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, RepositoryError> {
        let cutoff = window_cutoff(Utc::now(), window).to_rfc3339_opts(SecondsFormat::Micros, true);
        let records: Vec<SessionRecord> = self
            .send_json(self.client.get(self.table(SESSIONS)).query(&[
                ("select", "*".to_string()),
                ("last_accessed", format!("gte.{cutoff}")),
                ("order", "last_accessed.desc".to_string()),
            ]))
            .await?;
        Ok(records.into_iter().map(SessionRecord::into_summary).collect())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        // History first so a schema without ON DELETE CASCADE still works.
        self.send(
            self.client
                .delete(self.table(HISTORY))
                .query(&[Self::eq_session(session_id)]),
        )
        .await?;

        let deleted: Vec<SessionRecord> = self
            .send_json(
                self.client
                    .delete(self.table(SESSIONS))
                    .query(&[Self::eq_session(session_id)])
                    .header("Prefer", "return=representation"),
            )
            .await?;

        if deleted.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_sessions(&self) -> Result<u64, RepositoryError> {
        let response = self
            .send(
                self.client
                    .get(self.table(SESSIONS))
                    .query(&[("select", "session_id"), ("limit", "1")])
                    .header("Prefer", "count=exact"),
            )
            .await?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| RepositoryError::Query("missing Content-Range total".to_string()))
    }
}
