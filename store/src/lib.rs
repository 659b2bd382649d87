//! Persistence for the word graph and the game's bookkeeping tables.
//!
//! Storage is split into narrow traits so the engine can depend on exactly the
//! capability it needs. [`SqliteStore`] is the production backend;
//! [`MemoryStore`] is a lock-guarded fake with fault injection for tests.
//!
//! Every method is synchronous. Async callers hop onto a blocking thread.

mod error;
mod filter;
mod fs;
mod memory;
mod sqlite;

use chrono::{DateTime, Utc};
use wordchain_types::{
    AuditRecord, GameSession, GameStateRecord, HistoryEntry, NewWord, SessionId, SessionSummary,
    SystemLogEntry, TemporaryBan, WordId, WordNode,
};

pub use error::StoreError;
pub use filter::WordFilter;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts for the `stats` admin command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub total: u64,
    pub alive: u64,
    pub consumed: u64,
    pub moderated_out: u64,
    /// Approved, alive and unconsumed.
    pub playable: u64,
}

/// The dictionary: word nodes and their flags.
pub trait WordGraphStore: Send + Sync {
    fn lookup(&self, word: &str) -> StoreResult<Option<WordNode>>;

    /// Rows with `lo <= id <= hi`, ordered by id.
    fn scan_range(&self, lo: WordId, hi: WordId) -> StoreResult<Vec<WordNode>>;

    /// Smallest and largest id, or `None` for an empty dictionary.
    fn id_bounds(&self) -> StoreResult<Option<(WordId, WordId)>>;

    /// Atomically flip `consumed` false to true. Returns `false` if another
    /// writer got there first or the word does not exist.
    fn cas_update_consumed(&self, word: &str, actor: &str, at: DateTime<Utc>)
    -> StoreResult<bool>;

    /// Mark consumed regardless of the current flag. Returns `false` only if
    /// the word does not exist.
    fn force_consume(&self, word: &str, actor: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Set `alive` on every listed id in one transaction. Returns the number of
    /// rows whose flag actually changed.
    fn bulk_set_alive(&self, ids: &[WordId], alive: bool) -> StoreResult<usize>;

    /// Set `alive` on every row. Returns the number of rows changed.
    fn set_all_alive(&self, alive: bool) -> StoreResult<usize>;

    fn count_words(&self, filter: &WordFilter) -> StoreResult<u64>;

    /// Clear `moderation_approved`. Returns `false` if the word does not exist.
    fn mark_moderated(&self, word: &str) -> StoreResult<bool>;

    /// Any approved, alive, unconsumed word.
    fn random_playable_word(&self) -> StoreResult<Option<String>>;

    /// Clear `consumed` on every row. Returns the number of rows changed.
    fn reset_consumption(&self) -> StoreResult<usize>;

    fn stats(&self) -> StoreResult<GraphStats>;

    /// Insert words, skipping any that already exist. Returns the number inserted.
    fn seed_words(&self, words: &[NewWord]) -> StoreResult<usize>;
}

/// Durable copy of the ban registry.
pub trait BanStore: Send + Sync {
    fn load_bans(&self) -> StoreResult<Vec<TemporaryBan>>;
    fn upsert_ban(&self, ban: &TemporaryBan) -> StoreResult<()>;
    fn delete_ban(&self, ch: char) -> StoreResult<bool>;
    /// Remove timed bans that expired at or before `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

pub trait SessionStore: Send + Sync {
    fn start_session(&self, start_word: &str, at: DateTime<Utc>) -> StoreResult<SessionId>;
    fn end_session(&self, id: SessionId, summary: &SessionSummary) -> StoreResult<()>;
    /// Newest first.
    fn recent_sessions(&self, limit: usize) -> StoreResult<Vec<GameSession>>;
    fn clear_sessions(&self) -> StoreResult<usize>;
}

pub trait AuditStore: Send + Sync {
    fn append_history(&self, entry: &HistoryEntry) -> StoreResult<()>;
    fn append_system_log(&self, entry: &SystemLogEntry) -> StoreResult<()>;

    fn append_audit(&self, record: &AuditRecord) -> StoreResult<()> {
        match record {
            AuditRecord::History(entry) => self.append_history(entry),
            AuditRecord::System(entry) => self.append_system_log(entry),
        }
    }

    /// Newest first.
    fn recent_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>>;
    /// Newest first.
    fn recent_system_logs(&self, limit: usize) -> StoreResult<Vec<SystemLogEntry>>;
    fn clear_audit(&self) -> StoreResult<usize>;
}

/// Single-row cross-restart game state.
pub trait StateStore: Send + Sync {
    fn load_state(&self) -> StoreResult<Option<GameStateRecord>>;
    fn save_state(&self, state: &GameStateRecord) -> StoreResult<()>;
    /// Forget the saved game so the next start picks a new word.
    fn clear_state(&self) -> StoreResult<bool>;
}

/// Everything the game needs from one backend.
pub trait GameStore: WordGraphStore + BanStore + SessionStore + AuditStore + StateStore {}

impl<T> GameStore for T where T: WordGraphStore + BanStore + SessionStore + AuditStore + StateStore {}
