//! Game-level records: chat input, sessions, audit rows, persisted state, events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::outcome::RejectReason;

/// Chat platform a submission arrived from (e.g. `chzzk`, `youtube`, `console`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_ascii_lowercase())
    }

    #[must_use]
    pub fn console() -> Self {
        Self("console".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A word submission, already stripped of the chat command prefix and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub platform: Platform,
    pub actor: String,
    pub word: String,
}

impl ChatMessage {
    pub fn new(platform: Platform, actor: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            platform,
            actor: actor.into(),
            word: word.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub start_word: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub words_played_count: u64,
    pub fail_count: u64,
    pub end_word: Option<String>,
    pub end_platform: Option<String>,
    pub end_user: Option<String>,
}

/// Bookkeeping written when a session closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub ended_at: DateTime<Utc>,
    pub words_played_count: u64,
    pub fail_count: u64,
    pub end_word: String,
    pub end_platform: Option<String>,
    pub end_user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "debug" => Self::Debug,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// One row of the player-visible game history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub actor: String,
    pub platform: String,
    pub input_word: String,
    pub previous_word: String,
    /// `success` or a [`RejectReason`] string.
    pub status: String,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    #[must_use]
    pub fn reason(&self) -> Option<RejectReason> {
        RejectReason::parse(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Anything the audit writer persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditRecord {
    History(HistoryEntry),
    System(SystemLogEntry),
}

/// Cross-restart game state, stored as a single versioned row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateRecord {
    pub current_word: String,
    pub last_actor: Option<String>,
    pub last_change_at: DateTime<Utc>,
    pub process_started_at: DateTime<Utc>,
    pub alert_sent: bool,
    pub accepting_answers: bool,
    pub session_id: Option<SessionId>,
    /// Accepted words in the current session.
    pub words_played: u64,
    /// Counted rejections in the current session.
    pub fail_count: u64,
}

impl GameStateRecord {
    pub const SCHEMA_VERSION: i64 = 2;

    #[must_use]
    pub fn fresh(current_word: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            current_word: current_word.into(),
            last_actor: None,
            last_change_at: now,
            process_started_at: now,
            alert_sent: false,
            accepting_answers: true,
            session_id: None,
            words_played: 0,
            fail_count: 0,
        }
    }
}

/// Events pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        word: String,
        hint: String,
    },
    WordAccepted {
        word: String,
        actor: String,
        platform: Platform,
        hint: String,
    },
    WordRejected {
        word: String,
        actor: String,
        reason: RejectReason,
    },
    GameOver {
        last_word: String,
        last_actor: Option<String>,
        banned: Option<char>,
    },
    AcceptancePaused,
    AcceptanceResumed,
    PlatformStatus {
        platform: Platform,
        online: bool,
    },
    StallAlert {
        word: String,
        stalled_secs: u64,
    },
}
