//! Temporary ban registry and the game-over auto-ban policy.
//!
//! A ban on `c` suppresses every word *ending* in `c`. Bans are held in
//! memory and written through to a [`BanStore`] so they survive a restart.
//! Expired bans are purged lazily on read.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::TimeDelta;
use tracing::{info, warn};
use wordchain_config::BansConfig;
use wordchain_store::{BanStore, StoreResult, WordFilter, WordGraphStore};
use wordchain_types::{BanExpiry, TemporaryBan, expand, first_syllable};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanDuration {
    For(TimeDelta),
    Permanent,
}

pub struct TemporaryBanRegistry {
    bans: RwLock<HashMap<char, TemporaryBan>>,
    store: Option<Arc<dyn BanStore>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TemporaryBanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryBanRegistry")
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl TemporaryBanRegistry {
    /// Registry without persistence.
    #[must_use]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            bans: RwLock::new(HashMap::new()),
            store: None,
            clock,
        }
    }

    /// Load active bans from `store` and write every later change through to it.
    pub fn load(store: Arc<dyn BanStore>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let now = clock.now();
        let purged = store.purge_expired(now)?;
        let bans: HashMap<char, TemporaryBan> = store
            .load_bans()?
            .into_iter()
            .filter(|ban| ban.is_active(now))
            .map(|ban| (ban.ch, ban))
            .collect();
        info!(active = bans.len(), purged, "Loaded bans");
        Ok(Self {
            bans: RwLock::new(bans),
            store: Some(store),
            clock,
        })
    }

    pub fn ban(&self, ch: char, duration: BanDuration) -> TemporaryBan {
        let now = self.clock.now();
        let ban = TemporaryBan {
            ch,
            banned_at: now,
            expiry: match duration {
                BanDuration::For(d) => now
                    .checked_add_signed(d)
                    .map_or(BanExpiry::Permanent, BanExpiry::At),
                BanDuration::Permanent => BanExpiry::Permanent,
            },
        };
        self.bans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ch, ban);
        if let Some(store) = &self.store
            && let Err(err) = store.upsert_ban(&ban)
        {
            warn!(ch = %ch, error = %err, "Failed to persist ban");
        }
        info!(ch = %ch, expiry = ?ban.expiry, "Banned character");
        ban
    }

    /// Lift a ban. Returns whether one was active.
    pub fn unban(&self, ch: char) -> bool {
        let removed = self
            .bans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ch);
        if let Some(store) = &self.store
            && let Err(err) = store.delete_ban(ch)
        {
            warn!(ch = %ch, error = %err, "Failed to delete persisted ban");
        }
        let now = self.clock.now();
        removed.is_some_and(|ban| ban.is_active(now))
    }

    /// Ban if not banned, unban otherwise. Returns whether `ch` is now banned.
    pub fn toggle(&self, ch: char, duration: BanDuration) -> bool {
        if self.is_banned(ch) {
            self.unban(ch);
            false
        } else {
            self.ban(ch, duration);
            true
        }
    }

    pub fn is_banned(&self, ch: char) -> bool {
        let now = self.clock.now();
        let expired = {
            let bans = self.bans.read().unwrap_or_else(PoisonError::into_inner);
            match bans.get(&ch) {
                None => return false,
                Some(ban) if ban.is_active(now) => return true,
                Some(_) => true,
            }
        };
        if expired {
            self.purge_one(ch);
        }
        false
    }

    /// Active bans ordered by character.
    pub fn list_active(&self) -> Vec<TemporaryBan> {
        let now = self.clock.now();
        let (mut active, expired): (Vec<TemporaryBan>, Vec<TemporaryBan>) = self
            .bans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .partition(|ban| ban.is_active(now));
        for ban in expired {
            self.purge_one(ban.ch);
        }
        active.sort_by_key(|ban| ban.ch);
        active
    }

    pub fn active_chars(&self) -> Vec<char> {
        self.list_active().into_iter().map(|ban| ban.ch).collect()
    }

    fn purge_one(&self, ch: char) {
        let now = self.clock.now();
        let mut bans = self.bans.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock; a fresh ban may have replaced it.
        if bans.get(&ch).is_some_and(|ban| !ban.is_active(now)) {
            bans.remove(&ch);
            drop(bans);
            if let Some(store) = &self.store
                && let Err(err) = store.delete_ban(ch)
            {
                warn!(ch = %ch, error = %err, "Failed to delete expired ban");
            }
            info!(ch = %ch, "Ban expired");
        }
    }
}

/// Bans a game-ending branch that has nearly run dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoBanPolicy {
    pub threshold: u64,
    pub duration: TimeDelta,
}

impl Default for AutoBanPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            duration: TimeDelta::hours(24),
        }
    }
}

impl From<&BansConfig> for AutoBanPolicy {
    fn from(config: &BansConfig) -> Self {
        let hours = i64::try_from(config.auto_ban_hours).unwrap_or(i64::MAX);
        Self {
            threshold: config.auto_ban_threshold,
            duration: TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX),
        }
    }
}

impl AutoBanPolicy {
    /// Evaluate once per game-over. Takes the ending word's first syllable,
    /// counts approved, alive words starting with any of its continuations,
    /// and bans it when the count is at or below the threshold.
    pub fn evaluate(
        &self,
        store: &dyn WordGraphStore,
        registry: &TemporaryBanRegistry,
        ending_word: &str,
    ) -> StoreResult<Option<char>> {
        let Some(ch) = first_syllable(ending_word) else {
            return Ok(None);
        };
        if registry.is_banned(ch) {
            return Ok(None);
        }
        let filter = WordFilter::all()
            .starting_with(expand(ch).as_slice())
            .approved(true)
            .alive(true);
        let remaining = store.count_words(&filter)?;
        if remaining > self.threshold {
            return Ok(None);
        }
        info!(
            ch = %ch,
            remaining,
            threshold = self.threshold,
            "Auto-banning exhausted branch"
        );
        registry.ban(ch, BanDuration::For(self.duration));
        Ok(Some(ch))
    }
}
