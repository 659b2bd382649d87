//! Continuation checks against a real store.

use chrono::Utc;
use wordchain_engine::{BanDuration, ReachabilityOracle};
use wordchain_store::WordGraphStore;

use crate::common::{clock, fast_retry, seeded, unbanned};

#[test]
fn haneul_continues_through_neulbo() {
    let db = seeded(&["하늘", "늘보", "보물"]);
    let clock = clock();
    let oracle = ReachabilityOracle::new(db.store.clone(), unbanned(&clock), fast_retry());

    assert!(oracle.has_continuation('늘').unwrap());

    db.store.force_consume("늘보", "tester", Utc::now()).unwrap();
    assert!(!oracle.has_continuation('늘').unwrap());
}

#[test]
fn initial_sound_rule_counts_alternate_starts() {
    // 녀 may be continued by 여.
    let db = seeded(&["소녀", "여름"]);
    let clock = clock();
    let oracle = ReachabilityOracle::new(db.store.clone(), unbanned(&clock), fast_retry());

    assert_eq!(oracle.continuation_count('녀').unwrap(), 1);
    assert_eq!(oracle.continuation_count('름').unwrap(), 0);
}

#[test]
fn banned_syllables_are_not_continuations() {
    let db = seeded(&["하늘", "늘보", "늘봄"]);
    let clock = clock();
    let bans = unbanned(&clock);
    let oracle = ReachabilityOracle::new(db.store.clone(), bans.clone(), fast_retry());
    assert_eq!(oracle.continuation_count('늘').unwrap(), 2);

    // Words ending in a banned syllable cannot be played.
    bans.ban('보', BanDuration::Permanent);
    assert_eq!(oracle.continuation_count('늘').unwrap(), 1);

    // Nor can anything starting with one.
    bans.ban('늘', BanDuration::Permanent);
    assert!(!oracle.has_continuation('늘').unwrap());
}

#[test]
fn moderated_and_dead_words_do_not_count() {
    let db = seeded(&["하늘", "늘보", "늘봄"]);
    let clock = clock();
    let oracle = ReachabilityOracle::new(db.store.clone(), unbanned(&clock), fast_retry());

    db.store.mark_moderated("늘보").unwrap();
    let node = db.store.lookup("늘봄").unwrap().unwrap();
    db.store.bulk_set_alive(&[node.id], false).unwrap();

    assert!(!oracle.has_continuation('늘').unwrap());
}
