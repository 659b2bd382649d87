//! SQLite backend.
//!
//! Each operation opens its own connection, so the store is `Send + Sync`
//! without a shared handle and concurrent callers contend only on SQLite's
//! own locks. WAL mode lets readers proceed during a convergence write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use tracing::{debug, info, warn};
use wordchain_types::{
    BanExpiry, GameSession, GameStateRecord, HistoryEntry, LogLevel, NewWord,
    SessionId, SessionSummary, SystemLogEntry, TemporaryBan, WordId, WordNode,
};

use crate::filter::WordFilter;
use crate::fs::prepare_db_path;
use crate::{
    AuditStore, BanStore, GraphStats, SessionStore, StateStore, StoreResult, WordGraphStore,
};

const WORD_COLUMNS: &str = "id, word, start_char, end_char, alive, consumed, consumed_by, \
                            consumed_at, moderation_approved, source_category";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS words (
            id INTEGER PRIMARY KEY,
            word TEXT NOT NULL UNIQUE,
            start_char TEXT NOT NULL,
            end_char TEXT NOT NULL,
            alive INTEGER NOT NULL DEFAULT 1,
            consumed INTEGER NOT NULL DEFAULT 0,
            consumed_by TEXT,
            consumed_at TEXT,
            moderation_approved INTEGER NOT NULL DEFAULT 1,
            source_category TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_words_start
        ON words(start_char, moderation_approved, alive, consumed);

        CREATE INDEX IF NOT EXISTS idx_words_end
        ON words(end_char);

        CREATE INDEX IF NOT EXISTS idx_words_consumed_at
        ON words(consumed_at) WHERE consumed = 1;

        -- NULL expires_at marks a permanent ban
        CREATE TABLE IF NOT EXISTS bans (
            ch TEXT PRIMARY KEY,
            banned_at TEXT NOT NULL,
            expires_at TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            start_word TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            words_played_count INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0,
            end_word TEXT,
            end_platform TEXT,
            end_user TEXT
        );

        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY,
            actor TEXT NOT NULL,
            platform TEXT NOT NULL,
            input_word TEXT NOT NULL,
            previous_word TEXT NOT NULL,
            status TEXT NOT NULL,
            at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS system_log (
            id INTEGER PRIMARY KEY,
            level TEXT NOT NULL,
            source TEXT NOT NULL,
            message TEXT NOT NULL,
            detail TEXT,
            at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS game_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL,
            current_word TEXT NOT NULL,
            last_actor TEXT,
            last_change_at TEXT NOT NULL,
            process_started_at TEXT NOT NULL,
            alert_sent INTEGER NOT NULL,
            accepting_answers INTEGER NOT NULL,
            session_id INTEGER,
            words_played INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0
        );
    ";

    /// Columns added to `game_state` after its first release.
    const GAME_STATE_UPGRADES: &'static [(&'static str, &'static str)] = &[
        ("words_played", "INTEGER NOT NULL DEFAULT 0"),
        ("fail_count", "INTEGER NOT NULL DEFAULT 0"),
    ];

    /// Open or create the word database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_timeout(path, Self::DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        prepare_db_path(&path)?;

        let store = Self { path, busy_timeout };
        let conn = store.connect_with(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(Self::SCHEMA)?;
        upgrade_game_state(&conn)?;
        info!(path = %store.path.display(), "Opened word store");
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StoreResult<Connection> {
        self.connect_with(OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    fn connect_with(&self, flags: OpenFlags) -> StoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }
}

/// Add any `game_state` column a database created by an older build lacks.
fn upgrade_game_state(conn: &Connection) -> StoreResult<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('game_state')")?;
    let existing = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (column, decl) in SqliteStore::GAME_STATE_UPGRADES {
        if !existing.iter().any(|name| name == column) {
            conn.execute_batch(&format!("ALTER TABLE game_state ADD COLUMN {column} {decl}"))?;
            info!(column, "Upgraded game_state table");
        }
    }
    Ok(())
}

fn char_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<char> {
    let raw: String = row.get(idx)?;
    raw.chars().next().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, "empty character column".into())
    })
}

fn word_from_row(row: &Row<'_>) -> rusqlite::Result<WordNode> {
    Ok(WordNode {
        id: WordId::new(row.get(0)?),
        word: row.get(1)?,
        start_char: char_at(row, 2)?,
        end_char: char_at(row, 3)?,
        alive: row.get(4)?,
        consumed: row.get(5)?,
        consumed_by: row.get(6)?,
        consumed_at: row.get(7)?,
        moderation_approved: row.get(8)?,
        source_category: row.get(9)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn char_values(chars: &[char]) -> impl Iterator<Item = Value> + '_ {
    chars.iter().map(|c| Value::Text(c.to_string()))
}

/// Render `filter` as a `WHERE` clause with positional parameters.
fn where_clause(filter: &WordFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values = Vec::new();

    if let Some(starts) = &filter.start_chars {
        clauses.push(format!("start_char IN ({})", placeholders(starts.len())));
        values.extend(char_values(starts));
    }
    if !filter.excluded_end_chars.is_empty() {
        let chars = &filter.excluded_end_chars;
        clauses.push(format!("end_char NOT IN ({})", placeholders(chars.len())));
        values.extend(char_values(chars));
    }
    for (column, flag) in [
        ("alive", filter.alive),
        ("consumed", filter.consumed),
        ("moderation_approved", filter.approved),
    ] {
        if let Some(flag) = flag {
            clauses.push(format!("{column} = ?"));
            values.push(Value::Integer(i64::from(flag)));
        }
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

impl WordGraphStore for SqliteStore {
    fn lookup(&self, word: &str) -> StoreResult<Option<WordNode>> {
        let conn = self.connect()?;
        let node = conn
            .query_row(
                &format!("SELECT {WORD_COLUMNS} FROM words WHERE word = ?1"),
                params![word],
                word_from_row,
            )
            .optional()?;
        Ok(node)
    }

    fn scan_range(&self, lo: WordId, hi: WordId) -> StoreResult<Vec<WordNode>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WORD_COLUMNS} FROM words WHERE id BETWEEN ?1 AND ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![lo.value(), hi.value()], word_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn id_bounds(&self) -> StoreResult<Option<(WordId, WordId)>> {
        let conn = self.connect()?;
        let (lo, hi): (Option<i64>, Option<i64>) =
            conn.query_row("SELECT MIN(id), MAX(id) FROM words", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
        Ok(lo.zip(hi).map(|(lo, hi)| (WordId::new(lo), WordId::new(hi))))
    }

    fn cas_update_consumed(
        &self,
        word: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE words SET consumed = 1, consumed_by = ?2, consumed_at = ?3
             WHERE word = ?1 AND consumed = 0",
            params![word, actor, at],
        )?;
        Ok(changed == 1)
    }

    fn force_consume(&self, word: &str, actor: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE words SET consumed = 1, consumed_by = ?2, consumed_at = ?3 WHERE word = ?1",
            params![word, actor, at],
        )?;
        Ok(changed == 1)
    }

    fn bulk_set_alive(&self, ids: &[WordId], alive: bool) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut changed = 0;
        {
            let mut stmt =
                tx.prepare_cached("UPDATE words SET alive = ?1 WHERE id = ?2 AND alive <> ?1")?;
            for id in ids {
                changed += stmt.execute(params![alive, id.value()])?;
            }
        }
        tx.commit()?;
        debug!(count = ids.len(), changed, alive, "Bulk alive update");
        Ok(changed)
    }

    fn set_all_alive(&self, alive: bool) -> StoreResult<usize> {
        let conn = self.connect()?;
        Ok(conn.execute("UPDATE words SET alive = ?1 WHERE alive <> ?1", params![alive])?)
    }

    fn count_words(&self, filter: &WordFilter) -> StoreResult<u64> {
        if filter.is_vacuous() {
            return Ok(0);
        }
        let (clause, values) = where_clause(filter);
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM words{clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn mark_moderated(&self, word: &str) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE words SET moderation_approved = 0 WHERE word = ?1",
            params![word],
        )?;
        Ok(changed == 1)
    }

    fn random_playable_word(&self) -> StoreResult<Option<String>> {
        let conn = self.connect()?;
        let word = conn
            .query_row(
                "SELECT word FROM words
                 WHERE moderation_approved = 1 AND alive = 1 AND consumed = 0
                 ORDER BY RANDOM() LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(word)
    }

    fn reset_consumption(&self) -> StoreResult<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE words SET consumed = 0, consumed_by = NULL, consumed_at = NULL
             WHERE consumed = 1",
            [],
        )?;
        info!(changed, "Reset consumption");
        Ok(changed)
    }

    fn stats(&self) -> StoreResult<GraphStats> {
        let conn = self.connect()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(alive), 0),
                    COALESCE(SUM(consumed), 0),
                    COALESCE(SUM(moderation_approved = 0), 0),
                    COALESCE(SUM(moderation_approved = 1 AND alive = 1 AND consumed = 0), 0)
             FROM words",
            [],
            |row| {
                Ok(GraphStats {
                    total: row.get::<_, i64>(0)? as u64,
                    alive: row.get::<_, i64>(1)? as u64,
                    consumed: row.get::<_, i64>(2)? as u64,
                    moderated_out: row.get::<_, i64>(3)? as u64,
                    playable: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    fn seed_words(&self, words: &[NewWord]) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO words
                 (word, start_char, end_char, alive, consumed, moderation_approved, source_category)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            )?;
            for word in words {
                inserted += stmt.execute(params![
                    word.word(),
                    word.start_char().to_string(),
                    word.end_char().to_string(),
                    word.alive(),
                    word.moderation_approved(),
                    word.source_category(),
                ])?;
            }
        }
        tx.commit()?;
        info!(offered = words.len(), inserted, "Seeded words");
        Ok(inserted)
    }
}

impl BanStore for SqliteStore {
    fn load_bans(&self) -> StoreResult<Vec<TemporaryBan>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT ch, banned_at, expires_at FROM bans ORDER BY ch")?;
        let rows = stmt.query_map([], |row| {
            let expires_at: Option<DateTime<Utc>> = row.get(2)?;
            Ok(TemporaryBan {
                ch: char_at(row, 0)?,
                banned_at: row.get(1)?,
                expiry: expires_at.map_or(BanExpiry::Permanent, BanExpiry::At),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn upsert_ban(&self, ban: &TemporaryBan) -> StoreResult<()> {
        let expires_at = match ban.expiry {
            BanExpiry::At(at) => Some(at),
            BanExpiry::Permanent => None,
        };
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO bans (ch, banned_at, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(ch) DO UPDATE SET banned_at = excluded.banned_at,
                                           expires_at = excluded.expires_at",
            params![ban.ch.to_string(), ban.banned_at, expires_at],
        )?;
        Ok(())
    }

    fn delete_ban(&self, ch: char) -> StoreResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM bans WHERE ch = ?1", params![ch.to_string()])?;
        Ok(changed == 1)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.connect()?;
        Ok(conn.execute(
            "DELETE FROM bans WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?)
    }
}

impl SessionStore for SqliteStore {
    fn start_session(&self, start_word: &str, at: DateTime<Utc>) -> StoreResult<SessionId> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO sessions (start_word, started_at) VALUES (?1, ?2)",
            params![start_word, at],
        )?;
        Ok(SessionId::new(conn.last_insert_rowid()))
    }

    fn end_session(&self, id: SessionId, summary: &SessionSummary) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE sessions SET ended_at = ?2, words_played_count = ?3, fail_count = ?4,
                                 end_word = ?5, end_platform = ?6, end_user = ?7
             WHERE id = ?1",
            params![
                id.value(),
                summary.ended_at,
                summary.words_played_count as i64,
                summary.fail_count as i64,
                summary.end_word,
                summary.end_platform,
                summary.end_user,
            ],
        )?;
        Ok(())
    }

    fn recent_sessions(&self, limit: usize) -> StoreResult<Vec<GameSession>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, start_word, started_at, ended_at, words_played_count, fail_count,
                    end_word, end_platform, end_user
             FROM sessions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(GameSession {
                id: SessionId::new(row.get(0)?),
                start_word: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                words_played_count: row.get::<_, i64>(4)? as u64,
                fail_count: row.get::<_, i64>(5)? as u64,
                end_word: row.get(6)?,
                end_platform: row.get(7)?,
                end_user: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn clear_sessions(&self) -> StoreResult<usize> {
        let conn = self.connect()?;
        Ok(conn.execute("DELETE FROM sessions", [])?)
    }
}

impl AuditStore for SqliteStore {
    fn append_history(&self, entry: &HistoryEntry) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO history (actor, platform, input_word, previous_word, status, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.actor,
                entry.platform,
                entry.input_word,
                entry.previous_word,
                entry.status,
                entry.at,
            ],
        )?;
        Ok(())
    }

    fn append_system_log(&self, entry: &SystemLogEntry) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO system_log (level, source, message, detail, at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.level.as_str(),
                entry.source,
                entry.message,
                entry.detail,
                entry.at,
            ],
        )?;
        Ok(())
    }

    fn recent_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT actor, platform, input_word, previous_word, status, at
             FROM history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                actor: row.get(0)?,
                platform: row.get(1)?,
                input_word: row.get(2)?,
                previous_word: row.get(3)?,
                status: row.get(4)?,
                at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn recent_system_logs(&self, limit: usize) -> StoreResult<Vec<SystemLogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT level, source, message, detail, at
             FROM system_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let level: String = row.get(0)?;
            Ok(SystemLogEntry {
                level: LogLevel::parse(&level),
                source: row.get(1)?,
                message: row.get(2)?,
                detail: row.get(3)?,
                at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn clear_audit(&self) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let history = tx.execute("DELETE FROM history", [])?;
        let system = tx.execute("DELETE FROM system_log", [])?;
        tx.commit()?;
        Ok(history + system)
    }
}

impl StateStore for SqliteStore {
    fn load_state(&self) -> StoreResult<Option<GameStateRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT schema_version, current_word, last_actor, last_change_at,
                        process_started_at, alert_sent, accepting_answers, session_id,
                        words_played, fail_count
                 FROM game_state WHERE id = 1",
                [],
                |row| {
                    let version: i64 = row.get(0)?;
                    let session_id: Option<i64> = row.get(7)?;
                    Ok((
                        version,
                        GameStateRecord {
                            current_word: row.get(1)?,
                            last_actor: row.get(2)?,
                            last_change_at: row.get(3)?,
                            process_started_at: row.get(4)?,
                            alert_sent: row.get(5)?,
                            accepting_answers: row.get(6)?,
                            session_id: session_id.map(SessionId::new),
                            words_played: row.get::<_, i64>(8)? as u64,
                            fail_count: row.get::<_, i64>(9)? as u64,
                        },
                    ))
                },
            )
            .optional()?;

        match row {
            Some((version, state)) if version == GameStateRecord::SCHEMA_VERSION => Ok(Some(state)),
            Some((version, _)) => {
                warn!(
                    version,
                    expected = GameStateRecord::SCHEMA_VERSION,
                    "Ignoring game state with unknown schema version"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn save_state(&self, state: &GameStateRecord) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO game_state
             (id, schema_version, current_word, last_actor, last_change_at,
              process_started_at, alert_sent, accepting_answers, session_id,
              words_played, fail_count)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                GameStateRecord::SCHEMA_VERSION,
                state.current_word,
                state.last_actor,
                state.last_change_at,
                state.process_started_at,
                state.alert_sent,
                state.accepting_answers,
                state.session_id.map(SessionId::value),
                state.words_played as i64,
                state.fail_count as i64,
            ],
        )?;
        Ok(())
    }

    fn clear_state(&self) -> StoreResult<bool> {
        let conn = self.connect()?;
        Ok(conn.execute("DELETE FROM game_state", [])? > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use chrono::TimeDelta;
    use wordchain_types::{AuditRecord, Platform};

    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("words.db")).unwrap();
        (dir, store)
    }

    fn seed(store: &SqliteStore, words: &[&str]) {
        let rows: Vec<NewWord> = words
            .iter()
            .map(|w| NewWord::new(*w, "noun").unwrap())
            .collect();
        store.seed_words(&rows).unwrap();
    }

    #[test]
    fn seed_and_lookup() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘", "늘보", "보리"]);

        let node = store.lookup("늘보").unwrap().unwrap();
        assert_eq!(node.start_char, '늘');
        assert_eq!(node.end_char, '보');
        assert!(node.alive);
        assert!(!node.consumed);
        assert!(node.moderation_approved);
        assert!(store.lookup("없음").unwrap().is_none());
    }

    #[test]
    fn seeding_twice_skips_duplicates() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘"]);
        let again = store
            .seed_words(&[NewWord::new("하늘", "noun").unwrap()])
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(store.stats().unwrap().total, 1);
    }

    #[test]
    fn cas_succeeds_once() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘"]);
        let now = Utc::now();

        assert!(store.cas_update_consumed("하늘", "alice", now).unwrap());
        assert!(!store.cas_update_consumed("하늘", "bob", now).unwrap());

        let node = store.lookup("하늘").unwrap().unwrap();
        assert!(node.consumed);
        assert_eq!(node.consumed_by.as_deref(), Some("alice"));
    }

    #[test]
    fn cas_on_missing_word_is_false() {
        let (_dir, store) = temp_store();
        assert!(!store.cas_update_consumed("없음", "alice", Utc::now()).unwrap());
    }

    #[test]
    fn concurrent_cas_has_single_winner() {
        let (_dir, store) = temp_store();
        seed(&store, &["늘보"]);
        let barrier = Barrier::new(8);

        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        usize::from(
                            store
                                .cas_update_consumed("늘보", &format!("actor{i}"), Utc::now())
                                .unwrap(),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(wins, 1);
    }

    #[test]
    fn bulk_set_alive_counts_real_flips() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘", "늘보", "보리"]);
        let ids: Vec<WordId> = ["하늘", "늘보"]
            .iter()
            .map(|w| store.lookup(w).unwrap().unwrap().id)
            .collect();

        assert_eq!(store.bulk_set_alive(&ids, false).unwrap(), 2);
        assert_eq!(store.bulk_set_alive(&ids, false).unwrap(), 0);
        assert_eq!(store.bulk_set_alive(&ids[..1], true).unwrap(), 1);
        assert_eq!(store.bulk_set_alive(&[], true).unwrap(), 0);
        assert_eq!(store.stats().unwrap().alive, 2);
    }

    #[test]
    fn scan_range_is_inclusive_and_ordered() {
        let (_dir, store) = temp_store();
        seed(&store, &["가나", "나다", "다라", "라마"]);
        let (lo, hi) = store.id_bounds().unwrap().unwrap();
        let all = store.scan_range(lo, hi).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let one = store.scan_range(lo, lo).unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn id_bounds_empty() {
        let (_dir, store) = temp_store();
        assert!(store.id_bounds().unwrap().is_none());
    }

    #[test]
    fn count_words_applies_filter() {
        let (_dir, store) = temp_store();
        seed(&store, &["늘보", "늘봄", "늠름", "능력", "늘다"]);
        store.cas_update_consumed("늘봄", "a", Utc::now()).unwrap();
        store.mark_moderated("늘다").unwrap();

        assert_eq!(store.count_words(&WordFilter::playable_from(&['늘'])).unwrap(), 1);
        assert_eq!(
            store
                .count_words(&WordFilter::playable_from(&['늘', '늠']))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count_words(&WordFilter::playable_from(&['늘', '늠', '능']).excluding_end(&['름']))
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .count_words(&WordFilter::all().starting_with(&[]))
                .unwrap(),
            0
        );
        assert_eq!(store.count_words(&WordFilter::all()).unwrap(), 5);
    }

    #[test]
    fn reset_clears_every_consumption() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘", "늘보"]);
        let t0 = Utc::now();
        store.cas_update_consumed("하늘", "a", t0).unwrap();
        store
            .cas_update_consumed("늘보", "b", t0 + TimeDelta::seconds(1))
            .unwrap();

        assert_eq!(store.reset_consumption().unwrap(), 2);
        assert_eq!(
            store
                .count_words(&WordFilter::all().consumed(true))
                .unwrap(),
            0
        );
        let node = store.lookup("하늘").unwrap().unwrap();
        assert!(node.consumed_by.is_none());
        assert!(node.consumed_at.is_none());
        assert!(store.cas_update_consumed("하늘", "c", t0).unwrap());
    }

    #[test]
    fn random_playable_word_skips_unplayable() {
        let (_dir, store) = temp_store();
        seed(&store, &["하늘", "늘보"]);
        store.cas_update_consumed("하늘", "a", Utc::now()).unwrap();
        store.mark_moderated("늘보").unwrap();
        assert!(store.random_playable_word().unwrap().is_none());

        seed(&store, &["보리"]);
        assert_eq!(store.random_playable_word().unwrap().as_deref(), Some("보리"));
    }

    #[test]
    fn bans_round_trip_and_purge() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        store
            .upsert_ban(&TemporaryBan {
                ch: '늘',
                banned_at: now,
                expiry: BanExpiry::At(now + TimeDelta::hours(24)),
            })
            .unwrap();
        store
            .upsert_ban(&TemporaryBan {
                ch: '름',
                banned_at: now,
                expiry: BanExpiry::Permanent,
            })
            .unwrap();

        let bans = store.load_bans().unwrap();
        assert_eq!(bans.len(), 2);
        assert!(
            bans.iter()
                .any(|b| b.ch == '름' && b.expiry == BanExpiry::Permanent)
        );

        assert_eq!(
            store.purge_expired(now + TimeDelta::hours(25)).unwrap(),
            1
        );
        assert_eq!(store.load_bans().unwrap().len(), 1);
        assert!(store.delete_ban('름').unwrap());
        assert!(!store.delete_ban('름').unwrap());
    }

    #[test]
    fn sessions_open_and_close() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        let id = store.start_session("시작", now).unwrap();
        store
            .end_session(
                id,
                &SessionSummary {
                    ended_at: now,
                    words_played_count: 12,
                    fail_count: 3,
                    end_word: "늘보".to_string(),
                    end_platform: Some("console".to_string()),
                    end_user: Some("alice".to_string()),
                },
            )
            .unwrap();

        let sessions = store.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].words_played_count, 12);
        assert_eq!(sessions[0].end_word.as_deref(), Some("늘보"));
        assert_eq!(store.clear_sessions().unwrap(), 1);
    }

    #[test]
    fn audit_rows_come_back_newest_first() {
        let (_dir, store) = temp_store();
        for word in ["하늘", "늘보"] {
            store
                .append_audit(&AuditRecord::History(HistoryEntry {
                    actor: "alice".to_string(),
                    platform: Platform::console().to_string(),
                    input_word: word.to_string(),
                    previous_word: "시작".to_string(),
                    status: "success".to_string(),
                    at: Utc::now(),
                }))
                .unwrap();
        }
        store
            .append_audit(&AuditRecord::System(SystemLogEntry {
                level: LogLevel::Warn,
                source: "ingest".to_string(),
                message: "reconnecting".to_string(),
                detail: None,
                at: Utc::now(),
            }))
            .unwrap();

        let history = store.recent_history(1).unwrap();
        assert_eq!(history[0].input_word, "늘보");
        let logs = store.recent_system_logs(5).unwrap();
        assert_eq!(logs[0].level, LogLevel::Warn);
        assert_eq!(store.clear_audit().unwrap(), 3);
    }

    #[test]
    fn state_record_round_trips() {
        let (_dir, store) = temp_store();
        assert!(store.load_state().unwrap().is_none());

        let mut state = GameStateRecord::fresh("시작", Utc::now());
        state.session_id = Some(SessionId::new(4));
        state.alert_sent = true;
        state.words_played = 7;
        state.fail_count = 2;
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state().unwrap(), Some(state.clone()));

        state.current_word = "작품".to_string();
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state().unwrap().unwrap().current_word, "작품");

        assert!(store.clear_state().unwrap());
        assert!(!store.clear_state().unwrap());
        assert!(store.load_state().unwrap().is_none());
    }

    #[test]
    fn old_game_state_table_is_upgraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE game_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    schema_version INTEGER NOT NULL,
                    current_word TEXT NOT NULL,
                    last_actor TEXT,
                    last_change_at TEXT NOT NULL,
                    process_started_at TEXT NOT NULL,
                    alert_sent INTEGER NOT NULL,
                    accepting_answers INTEGER NOT NULL,
                    session_id INTEGER
                );
                INSERT INTO game_state VALUES
                    (1, 1, '시작', NULL, '2024-01-01 00:00:00+00:00', '2024-01-01 00:00:00+00:00', 0, 1, 3);",
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        // A version 1 row has no counters, so it is not resumed.
        assert!(store.load_state().unwrap().is_none());

        let mut state = GameStateRecord::fresh("작품", Utc::now());
        state.words_played = 5;
        state.fail_count = 1;
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state().unwrap(), Some(state));

        // Reopening an upgraded file is a no-op.
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_state().unwrap().unwrap().words_played, 5);
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            seed(&store, &["하늘"]);
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.lookup("하늘").unwrap().is_some());
    }
}
