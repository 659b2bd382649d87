//! Core domain types for the word-chain validator.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application, including the
//! initial-sound-law resolver, which is a pure function over a single syllable.

mod ban;
mod game;
mod ids;
mod outcome;
pub mod phonetic;
mod word;

pub use ban::{BanExpiry, TemporaryBan};
pub use game::{
    AuditRecord, ChatMessage, GameEvent, GameSession, GameStateRecord, HistoryEntry, LogLevel,
    Platform, SessionSummary, SystemLogEntry,
};
pub use ids::{SessionId, WordId};
pub use outcome::{ConsumeOutcome, RejectReason};
pub use phonetic::{Continuations, expand, first_syllable, is_hangul_word, last_syllable};
pub use word::{NewWord, WordError, WordNode};
