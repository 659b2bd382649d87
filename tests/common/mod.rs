//! Shared test utilities and fixtures
//!
//! Every scenario runs against a real SQLite file in a temp directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use wordchain_engine::{ManualClock, RetryPolicy, TemporaryBanRegistry};
use wordchain_store::{SqliteStore, WordGraphStore};
use wordchain_types::NewWord;

pub struct TestDb {
    dir: TempDir,
    pub store: Arc<SqliteStore>,
}

impl TestDb {
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("words.db")
    }

    /// A second handle on the same file.
    pub fn reopen(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::open(self.path()).unwrap())
    }
}

/// Fresh database seeded with `words`, all alive and approved.
pub fn seeded(words: &[&str]) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("words.db")).unwrap());
    let rows: Vec<NewWord> = words
        .iter()
        .map(|w| NewWord::new(*w, "noun").unwrap())
        .collect();
    assert_eq!(store.seed_words(&rows).unwrap(), words.len());
    TestDb { dir, store }
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc::now()))
}

pub fn unbanned(clock: &Arc<ManualClock>) -> Arc<TemporaryBanRegistry> {
    Arc::new(TemporaryBanRegistry::in_memory(clock.clone()))
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::immediate(2)
}
