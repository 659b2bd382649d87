//! Lock-guarded in-memory store.
//!
//! Behaves like [`crate::SqliteStore`] for every trait method and can be told
//! to fail upcoming calls, which is how retry and partial-window paths are
//! exercised without a real database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use wordchain_types::{
    GameSession, GameStateRecord, HistoryEntry, NewWord, SessionId, SessionSummary,
    SystemLogEntry, TemporaryBan, WordId, WordNode,
};

use crate::error::StoreError;
use crate::filter::WordFilter;
use crate::{
    AuditStore, BanStore, GraphStats, SessionStore, StateStore, StoreResult, WordGraphStore,
};

#[derive(Debug, Default)]
struct Inner {
    /// Ordered by id.
    words: Vec<WordNode>,
    by_word: HashMap<String, usize>,
    next_id: i64,
    bans: HashMap<char, TemporaryBan>,
    sessions: Vec<GameSession>,
    history: Vec<HistoryEntry>,
    system_log: Vec<SystemLogEntry>,
    state: Option<GameStateRecord>,
}

impl Inner {
    fn word_mut(&mut self, word: &str) -> Option<&mut WordNode> {
        let idx = *self.by_word.get(word)?;
        self.words.get_mut(idx)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_ops: AtomicU32,
    fail_alive_writes: AtomicU32,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `words`, all approved and alive.
    pub fn with_words(words: &[&str]) -> StoreResult<Self> {
        let rows = words
            .iter()
            .map(|w| NewWord::new(*w, "noun"))
            .collect::<Result<Vec<_>, _>>()?;
        let store = Self::new();
        store.seed_words(&rows)?;
        Ok(store)
    }

    /// Fail the next `n` calls of any kind with a transient error.
    pub fn fail_next_ops(&self, n: u32) {
        self.fail_ops.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `bulk_set_alive` calls with a transient error.
    pub fn fail_next_alive_writes(&self, n: u32) {
        self.fail_alive_writes.store(n, Ordering::SeqCst);
    }

    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_fault(&self) -> StoreResult<()> {
        if Self::take_fault(&self.fail_ops) {
            return Err(StoreError::Unavailable("injected fault".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.check_fault()?;
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.check_fault()?;
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl WordGraphStore for MemoryStore {
    fn lookup(&self, word: &str) -> StoreResult<Option<WordNode>> {
        let inner = self.read()?;
        Ok(inner
            .by_word
            .get(word)
            .and_then(|&idx| inner.words.get(idx))
            .cloned())
    }

    fn scan_range(&self, lo: WordId, hi: WordId) -> StoreResult<Vec<WordNode>> {
        let inner = self.read()?;
        Ok(inner
            .words
            .iter()
            .filter(|n| n.id >= lo && n.id <= hi)
            .cloned()
            .collect())
    }

    fn id_bounds(&self) -> StoreResult<Option<(WordId, WordId)>> {
        let inner = self.read()?;
        Ok(inner.words.first().zip(inner.words.last()).map(|(a, b)| (a.id, b.id)))
    }

    fn cas_update_consumed(
        &self,
        word: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.write()?;
        match inner.word_mut(word) {
            Some(node) if !node.consumed => {
                node.consumed = true;
                node.consumed_by = Some(actor.to_string());
                node.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn force_consume(&self, word: &str, actor: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.write()?;
        match inner.word_mut(word) {
            Some(node) => {
                node.consumed = true;
                node.consumed_by = Some(actor.to_string());
                node.consumed_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn bulk_set_alive(&self, ids: &[WordId], alive: bool) -> StoreResult<usize> {
        if Self::take_fault(&self.fail_alive_writes) {
            return Err(StoreError::Unavailable("injected alive-write fault".to_string()));
        }
        let mut inner = self.write()?;
        let mut changed = 0;
        for id in ids {
            if let Ok(idx) = inner.words.binary_search_by_key(id, |n| n.id) {
                let node = &mut inner.words[idx];
                if node.alive != alive {
                    node.alive = alive;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn set_all_alive(&self, alive: bool) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let mut changed = 0;
        for node in inner.words.iter_mut().filter(|n| n.alive != alive) {
            node.alive = alive;
            changed += 1;
        }
        Ok(changed)
    }

    fn count_words(&self, filter: &WordFilter) -> StoreResult<u64> {
        let inner = self.read()?;
        Ok(inner.words.iter().filter(|n| filter.matches(n)).count() as u64)
    }

    fn mark_moderated(&self, word: &str) -> StoreResult<bool> {
        let mut inner = self.write()?;
        match inner.word_mut(word) {
            Some(node) => {
                node.moderation_approved = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Lowest-id playable word, so tests stay deterministic.
    fn random_playable_word(&self) -> StoreResult<Option<String>> {
        let inner = self.read()?;
        Ok(inner
            .words
            .iter()
            .find(|n| n.is_playable())
            .map(|n| n.word.clone()))
    }

    fn reset_consumption(&self) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let mut changed = 0;
        for node in inner.words.iter_mut().filter(|n| n.consumed) {
            node.consumed = false;
            node.consumed_by = None;
            node.consumed_at = None;
            changed += 1;
        }
        Ok(changed)
    }

    fn stats(&self) -> StoreResult<GraphStats> {
        let inner = self.read()?;
        let mut stats = GraphStats::default();
        for node in &inner.words {
            stats.total += 1;
            stats.alive += u64::from(node.alive);
            stats.consumed += u64::from(node.consumed);
            stats.moderated_out += u64::from(!node.moderation_approved);
            stats.playable += u64::from(node.is_playable());
        }
        Ok(stats)
    }

    fn seed_words(&self, words: &[NewWord]) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let mut inserted = 0;
        for word in words {
            if inner.by_word.contains_key(word.word()) {
                continue;
            }
            inner.next_id += 1;
            let node = WordNode {
                id: WordId::new(inner.next_id),
                word: word.word().to_string(),
                start_char: word.start_char(),
                end_char: word.end_char(),
                alive: word.alive(),
                consumed: false,
                consumed_by: None,
                consumed_at: None,
                moderation_approved: word.moderation_approved(),
                source_category: word.source_category().to_string(),
            };
            let idx = inner.words.len();
            inner.by_word.insert(node.word.clone(), idx);
            inner.words.push(node);
            inserted += 1;
        }
        Ok(inserted)
    }
}

impl BanStore for MemoryStore {
    fn load_bans(&self) -> StoreResult<Vec<TemporaryBan>> {
        let inner = self.read()?;
        let mut bans: Vec<TemporaryBan> = inner.bans.values().copied().collect();
        bans.sort_by_key(|b| b.ch);
        Ok(bans)
    }

    fn upsert_ban(&self, ban: &TemporaryBan) -> StoreResult<()> {
        self.write()?.bans.insert(ban.ch, *ban);
        Ok(())
    }

    fn delete_ban(&self, ch: char) -> StoreResult<bool> {
        Ok(self.write()?.bans.remove(&ch).is_some())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let before = inner.bans.len();
        inner.bans.retain(|_, ban| ban.is_active(now));
        Ok(before - inner.bans.len())
    }
}

impl SessionStore for MemoryStore {
    fn start_session(&self, start_word: &str, at: DateTime<Utc>) -> StoreResult<SessionId> {
        let mut inner = self.write()?;
        let id = SessionId::new(inner.sessions.last().map_or(1, |s| s.id.value() + 1));
        inner.sessions.push(GameSession {
            id,
            start_word: start_word.to_string(),
            started_at: at,
            ended_at: None,
            words_played_count: 0,
            fail_count: 0,
            end_word: None,
            end_platform: None,
            end_user: None,
        });
        Ok(id)
    }

    fn end_session(&self, id: SessionId, summary: &SessionSummary) -> StoreResult<()> {
        let mut inner = self.write()?;
        if let Some(session) = inner.sessions.iter_mut().find(|s| s.id == id) {
            session.ended_at = Some(summary.ended_at);
            session.words_played_count = summary.words_played_count;
            session.fail_count = summary.fail_count;
            session.end_word = Some(summary.end_word.clone());
            session.end_platform.clone_from(&summary.end_platform);
            session.end_user.clone_from(&summary.end_user);
        }
        Ok(())
    }

    fn recent_sessions(&self, limit: usize) -> StoreResult<Vec<GameSession>> {
        let inner = self.read()?;
        Ok(inner.sessions.iter().rev().take(limit).cloned().collect())
    }

    fn clear_sessions(&self) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let n = inner.sessions.len();
        inner.sessions.clear();
        Ok(n)
    }
}

impl AuditStore for MemoryStore {
    fn append_history(&self, entry: &HistoryEntry) -> StoreResult<()> {
        self.write()?.history.push(entry.clone());
        Ok(())
    }

    fn append_system_log(&self, entry: &SystemLogEntry) -> StoreResult<()> {
        self.write()?.system_log.push(entry.clone());
        Ok(())
    }

    fn recent_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let inner = self.read()?;
        Ok(inner.history.iter().rev().take(limit).cloned().collect())
    }

    fn recent_system_logs(&self, limit: usize) -> StoreResult<Vec<SystemLogEntry>> {
        let inner = self.read()?;
        Ok(inner.system_log.iter().rev().take(limit).cloned().collect())
    }

    fn clear_audit(&self) -> StoreResult<usize> {
        let mut inner = self.write()?;
        let n = inner.history.len() + inner.system_log.len();
        inner.history.clear();
        inner.system_log.clear();
        Ok(n)
    }
}

impl StateStore for MemoryStore {
    fn load_state(&self) -> StoreResult<Option<GameStateRecord>> {
        Ok(self.read()?.state.clone())
    }

    fn save_state(&self, state: &GameStateRecord) -> StoreResult<()> {
        self.write()?.state = Some(state.clone());
        Ok(())
    }

    fn clear_state(&self) -> StoreResult<bool> {
        Ok(self.write()?.state.take().is_some())
    }
}
