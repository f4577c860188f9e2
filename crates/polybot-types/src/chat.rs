//! Session, turn, and listing types for PolyBot.
//!
//! A session is one conversation thread keyed by an opaque identifier. Its
//! transcript is the ordered list of turns recorded against that identifier.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::llm::MessageRole;

/// Language used for sessions that never had a preference set.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Default trailing window used when listing sessions.
pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 7;

/// Listing window for `days`, saturating at `TimeDelta::MAX`.
///
/// Returns `None` for zero or negative values.
pub fn recency_window(days: i64) -> Option<TimeDelta> {
    if days <= 0 {
        return None;
    }
    Some(TimeDelta::try_days(days).unwrap_or(TimeDelta::MAX))
}

/// Oldest `last_accessed` still inside `window`, counted back from `now`.
///
/// Windows reaching before the Unix epoch are clamped to it.
pub fn window_cutoff(now: DateTime<Utc>, window: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .filter(|cutoff| *cutoff > DateTime::<Utc>::UNIX_EPOCH)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Opaque session identifier.
///
/// New sessions get a UUID v7 string, but any non-empty string supplied by a
/// caller is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh identifier (UUID v7, time-sortable).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who produced a turn.
///
/// Maps to the `role` column of the `history` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

impl From<TurnRole> for MessageRole {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => MessageRole::User,
            TurnRole::Assistant => MessageRole::Assistant,
        }
    }
}

/// Session metadata. The transcript is loaded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Optional display name shown in listings.
    pub name: Option<String>,
    /// Free-form language preference; never validated.
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Session {
    /// A brand-new session with the default language.
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: None,
            language: DEFAULT_LANGUAGE.to_string(),
            created_at: now,
            last_accessed: now,
        }
    }

    /// Display name, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// One message in a transcript. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: SessionId,
    pub role: TurnRole,
    /// The text exactly as submitted or returned, never prompt-wrapped.
    pub content: String,
    /// Language preference in force when the turn was recorded, if known.
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        session_id: SessionId,
        role: TurnRole,
        content: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            session_id,
            role,
            content: content.into(),
            language,
            created_at: Utc::now(),
        }
    }
}

/// Row returned by session listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            language: session.language.clone(),
            created_at: session.created_at,
            last_accessed: session.last_accessed,
        }
    }
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self::from(&session)
    }
}
