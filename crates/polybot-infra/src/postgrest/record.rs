//! Wire records for the PostgREST `sessions` and `history` tables.

use chrono::{DateTime, Utc};
use polybot_types::chat::{Session, SessionId, SessionSummary, Turn, TurnRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionRecord {
    pub session_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.0.clone(),
            name: session.name.clone(),
            language: session.language.clone(),
            created_at: session.created_at,
            last_accessed: session.last_accessed,
        }
    }
}

impl SessionRecord {
    pub fn into_session(self) -> Session {
        Session {
            id: SessionId::from(self.session_id),
            name: self.name,
            language: self.language,
            created_at: self.created_at,
            last_accessed: self.last_accessed,
        }
    }

    pub fn into_summary(self) -> SessionSummary {
        SessionSummary::from(self.into_session())
    }
}

/// `id` is assigned by the database and omitted on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub session_id: String,
    pub role: TurnRole,
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&Turn> for HistoryRecord {
    fn from(turn: &Turn) -> Self {
        Self {
            id: None,
            session_id: turn.session_id.0.clone(),
            role: turn.role,
            message: turn.content.clone(),
            language: turn.language.clone(),
            timestamp: turn.created_at,
        }
    }
}

impl HistoryRecord {
    pub fn into_turn(self) -> Turn {
        Turn {
            session_id: SessionId::from(self.session_id),
            role: self.role,
            content: self.message,
            language: self.language,
            created_at: self.timestamp,
        }
    }
}

/// Body of a PostgREST error response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostgrestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
