//! Does the current terminal syllable still have a legal continuation?

use std::sync::Arc;

use wordchain_store::{StoreResult, WordFilter, WordGraphStore};
use wordchain_types::expand;

use crate::bans::TemporaryBanRegistry;
use crate::retry::RetryPolicy;

pub struct ReachabilityOracle {
    store: Arc<dyn WordGraphStore>,
    bans: Arc<TemporaryBanRegistry>,
    retry: RetryPolicy,
}

impl ReachabilityOracle {
    pub fn new(
        store: Arc<dyn WordGraphStore>,
        bans: Arc<TemporaryBanRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self { store, bans, retry }
    }

    /// Number of approved, alive, unconsumed words that may follow `terminal`.
    ///
    /// Candidates starting with a banned syllable are skipped, and so are
    /// candidates ending in one, because the ledger would reject them.
    pub fn continuation_count(&self, terminal: char) -> StoreResult<u64> {
        let starts: Vec<char> = expand(terminal)
            .iter()
            .filter(|c| !self.bans.is_banned(*c))
            .collect();
        if starts.is_empty() {
            return Ok(0);
        }
        let filter = WordFilter::playable_from(&starts).excluding_end(&self.bans.active_chars());
        self.retry
            .run("continuation_count", || self.store.count_words(&filter))
    }

    /// An error means "unable to verify", never "no continuation".
    pub fn has_continuation(&self, terminal: char) -> StoreResult<bool> {
        Ok(self.continuation_count(terminal)? > 0)
    }
}
