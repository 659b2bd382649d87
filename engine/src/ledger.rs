//! Consumption ledger: the per-word `Available -> Consumed` state machine.
//!
//! Exactly-once consumption rests on a single-row compare-and-set in the
//! store. Any number of callers may race on the same word; one gets
//! `Success`, the rest get `AlreadyConsumed`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use wordchain_store::{StoreResult, WordGraphStore};
use wordchain_types::{ConsumeOutcome, RejectReason, WordNode, last_syllable};

use crate::bans::TemporaryBanRegistry;
use crate::clock::Clock;
use crate::retry::RetryPolicy;

pub struct ConsumptionLedger {
    store: Arc<dyn WordGraphStore>,
    bans: Arc<TemporaryBanRegistry>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ConsumptionLedger {
    pub fn new(
        store: Arc<dyn WordGraphStore>,
        bans: Arc<TemporaryBanRegistry>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            bans,
            clock,
            retry,
        }
    }

    /// Validate and atomically consume `word` on behalf of `actor`.
    ///
    /// Blocking; run it off the async executor.
    pub fn try_consume(&self, word: &str, actor: &str) -> ConsumeOutcome {
        let Some(terminal) = last_syllable(word) else {
            return ConsumeOutcome::rejected(RejectReason::Malformed);
        };
        if self.bans.is_banned(terminal) {
            debug!(word, terminal = %terminal, "Rejected: terminal character is banned");
            return ConsumeOutcome::rejected(RejectReason::TemporarilyBanned);
        }

        let node = match self.retry.run("lookup", || self.store.lookup(word)) {
            Ok(node) => node,
            Err(err) => {
                warn!(word, error = %err, "Lookup failed, unable to verify");
                return ConsumeOutcome::rejected(RejectReason::StoreError);
            }
        };
        if let Some(reason) = precheck(node.as_ref()) {
            debug!(word, reason = reason.as_str(), "Rejected");
            return ConsumeOutcome::rejected(reason);
        }

        let at = self.clock.now();
        match self
            .retry
            .run("cas_update_consumed", || self.store.cas_update_consumed(word, actor, at))
        {
            Ok(true) => {
                info!(word, actor, "Consumed");
                ConsumeOutcome::Success { terminal }
            }
            Ok(false) => {
                debug!(word, actor, "Lost consumption race");
                ConsumeOutcome::rejected(RejectReason::AlreadyConsumed)
            }
            Err(err) => {
                warn!(word, error = %err, "Consume failed, unable to verify");
                ConsumeOutcome::rejected(RejectReason::StoreError)
            }
        }
    }

    /// Administrative override: consume `word` regardless of its flags.
    /// Returns the new terminal character, or `None` if the word is unknown.
    pub fn force_consume(&self, word: &str, actor: &str) -> StoreResult<Option<char>> {
        let at = self.clock.now();
        let found = self
            .retry
            .run("force_consume", || self.store.force_consume(word, actor, at))?;
        if found {
            info!(word, actor, "Force-consumed");
        }
        Ok(if found { last_syllable(word) } else { None })
    }

    /// Revoke approval. One-way: nothing in the game restores it.
    pub fn mark_moderated(&self, word: &str) -> StoreResult<bool> {
        let found = self
            .retry
            .run("mark_moderated", || self.store.mark_moderated(word))?;
        if found {
            info!(word, "Moderated out");
        }
        Ok(found)
    }
}

fn precheck(node: Option<&WordNode>) -> Option<RejectReason> {
    match node {
        None => Some(RejectReason::NotFound),
        Some(n) if !n.moderation_approved => Some(RejectReason::ModeratedOut),
        Some(n) if !n.alive => Some(RejectReason::Dead),
        Some(n) if n.consumed => Some(RejectReason::AlreadyConsumed),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use chrono::{TimeDelta, Utc};
    use wordchain_store::{MemoryStore, SqliteStore};
    use wordchain_types::NewWord;

    use super::*;
    use crate::bans::BanDuration;
    use crate::clock::{ManualClock, SystemClock};

    fn ledger_over(store: Arc<dyn WordGraphStore>) -> (Arc<TemporaryBanRegistry>, ConsumptionLedger) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bans = Arc::new(TemporaryBanRegistry::in_memory(clock.clone()));
        let ledger = ConsumptionLedger::new(store, bans.clone(), clock, RetryPolicy::immediate(2));
        (bans, ledger)
    }

    #[test]
    fn consumes_once() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let (_bans, ledger) = ledger_over(store);

        assert_eq!(
            ledger.try_consume("하늘", "alice"),
            ConsumeOutcome::Success { terminal: '늘' }
        );
        assert_eq!(
            ledger.try_consume("하늘", "bob").reason(),
            Some(RejectReason::AlreadyConsumed)
        );
    }

    #[test]
    fn rejection_reasons_in_order() {
        let store = Arc::new(MemoryStore::with_words(&["하늘", "늘보", "보리"]).unwrap());
        store.mark_moderated("늘보").unwrap();
        let id = store.lookup("보리").unwrap().unwrap().id;
        store.bulk_set_alive(&[id], false).unwrap();
        let (_bans, ledger) = ledger_over(store);

        assert_eq!(
            ledger.try_consume("없음", "a").reason(),
            Some(RejectReason::NotFound)
        );
        assert_eq!(
            ledger.try_consume("늘보", "a").reason(),
            Some(RejectReason::ModeratedOut)
        );
        assert_eq!(
            ledger.try_consume("보리", "a").reason(),
            Some(RejectReason::Dead)
        );
        assert_eq!(ledger.try_consume("", "a").reason(), Some(RejectReason::Malformed));
    }

    #[test]
    fn banned_terminal_is_rejected_before_lookup() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let (bans, ledger) = ledger_over(store.clone());
        bans.ban('늘', BanDuration::Permanent);

        // A failing store would surface as StoreError if it were consulted.
        store.fail_next_ops(10);
        assert_eq!(
            ledger.try_consume("하늘", "a").reason(),
            Some(RejectReason::TemporarilyBanned)
        );
        store.fail_next_ops(0);
        assert!(!store.lookup("하늘").unwrap().unwrap().consumed);
    }

    #[test]
    fn ban_expiry_reopens_word() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let bans = Arc::new(TemporaryBanRegistry::in_memory(clock.clone()));
        let ledger = ConsumptionLedger::new(store, bans.clone(), clock.clone(), RetryPolicy::immediate(0));
        bans.ban('늘', BanDuration::For(TimeDelta::hours(24)));

        assert_eq!(
            ledger.try_consume("하늘", "a").reason(),
            Some(RejectReason::TemporarilyBanned)
        );
        clock.advance(TimeDelta::hours(24));
        assert!(ledger.try_consume("하늘", "a").is_success());
    }

    #[test]
    fn transient_failures_are_retried() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let (_bans, ledger) = ledger_over(store.clone());
        store.fail_next_ops(2);
        assert!(ledger.try_consume("하늘", "a").is_success());
    }

    #[test]
    fn exhausted_retries_surface_store_error() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let (_bans, ledger) = ledger_over(store.clone());
        store.fail_next_ops(3);
        assert_eq!(
            ledger.try_consume("하늘", "a").reason(),
            Some(RejectReason::StoreError)
        );
        store.fail_next_ops(0);
        assert!(!store.lookup("하늘").unwrap().unwrap().consumed);
    }

    #[test]
    fn force_consume_ignores_flags() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        store.mark_moderated("하늘").unwrap();
        let (_bans, ledger) = ledger_over(store.clone());

        assert_eq!(ledger.force_consume("하늘", "admin").unwrap(), Some('늘'));
        assert_eq!(ledger.force_consume("없음", "admin").unwrap(), None);
        assert!(store.lookup("하늘").unwrap().unwrap().consumed);
    }

    #[test]
    fn moderation_is_one_way() {
        let store = Arc::new(MemoryStore::with_words(&["하늘"]).unwrap());
        let (_bans, ledger) = ledger_over(store.clone());
        assert!(ledger.mark_moderated("하늘").unwrap());
        assert!(ledger.mark_moderated("하늘").unwrap());
        assert!(!store.lookup("하늘").unwrap().unwrap().moderation_approved);
    }

    #[test]
    fn exactly_once_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("words.db")).unwrap();
        store
            .seed_words(&[NewWord::new("늘보", "noun").unwrap()])
            .unwrap();
        let (_bans, ledger) = ledger_over(Arc::new(store));

        const RACERS: usize = 16;
        let barrier = Barrier::new(RACERS);
        let outcomes: Vec<ConsumeOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..RACERS)
                .map(|i| {
                    let ledger = &ledger;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        ledger.try_consume("늘보", &format!("viewer{i}"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = outcomes.iter().filter(|o| o.is_success()).count();
        assert_eq!(successes, 1);
        assert!(
            outcomes
                .iter()
                .filter(|o| !o.is_success())
                .all(|o| o.reason() == Some(RejectReason::AlreadyConsumed))
        );
    }
}
