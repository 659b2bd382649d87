//! Liveness convergence over SQLite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;
use wordchain_engine::liveness::fixpoint_violations;
use wordchain_engine::{ConsumptionLedger, ConvergenceOptions, LivenessEngine};
use wordchain_store::{WordFilter, WordGraphStore};
use wordchain_types::{ConsumeOutcome, NewWord};

use crate::common::{TestDb, clock, fast_retry, seeded, unbanned};

const WORDS: &[&str] = &["가나", "나가", "가방", "미로", "개미", "물개"];

fn alive(store: &dyn WordGraphStore, word: &str) -> bool {
    store.lookup(word).unwrap().unwrap().alive
}

fn engine(db: &TestDb, window_size: u64) -> LivenessEngine {
    LivenessEngine::new(
        db.store.clone(),
        ConvergenceOptions {
            window_size,
            ..ConvergenceOptions::default()
        },
    )
}

#[test]
fn dead_chains_collapse_and_cycles_survive() {
    let db = seeded(WORDS);
    let report = engine(&db, 2).converge().unwrap();

    assert!(report.converged);
    assert_eq!(report.failed_windows, 0);
    assert_eq!(report.killed, 4);
    assert_eq!(report.alive_after, 2);

    for word in ["가나", "나가"] {
        assert!(alive(db.store.as_ref(), word), "{word} should stay alive");
    }
    for word in ["가방", "미로", "개미", "물개"] {
        assert!(!alive(db.store.as_ref(), word), "{word} should be dead");
    }
    assert!(fixpoint_violations(db.store.as_ref()).unwrap().is_empty());
}

#[test]
fn consuming_a_cycle_member_kills_the_cycle() {
    let db = seeded(WORDS);
    let engine = engine(&db, 1000);
    engine.converge().unwrap();

    db.store.force_consume("나가", "tester", Utc::now()).unwrap();
    let report = engine.converge().unwrap();

    assert!(report.converged);
    assert!(!alive(db.store.as_ref(), "가나"));
    assert!(!alive(db.store.as_ref(), "나가"));
    assert_eq!(report.alive_after, 0);
    assert!(fixpoint_violations(db.store.as_ref()).unwrap().is_empty());
}

#[test]
fn recompute_from_top_revives_new_support() {
    let db = seeded(WORDS);
    let engine = engine(&db, 3);
    engine.converge().unwrap();
    assert!(!alive(db.store.as_ref(), "미로"));

    // A fresh 노 word supports 미로 through the initial sound rule.
    let rows = [
        NewWord::new("노래", "noun").unwrap(),
        NewWord::new("래가", "noun").unwrap(),
    ];
    db.store.seed_words(&rows).unwrap();

    let report = engine.recompute_from_top().unwrap();
    assert!(report.converged);
    for word in ["미로", "개미", "물개", "노래", "래가"] {
        assert!(alive(db.store.as_ref(), word), "{word} should be alive");
    }
    assert!(!alive(db.store.as_ref(), "가방"));
    assert!(fixpoint_violations(db.store.as_ref()).unwrap().is_empty());
}

#[test]
fn second_run_changes_nothing() {
    let db = seeded(WORDS);
    let engine = engine(&db, 2);
    engine.converge().unwrap();

    let again = engine.converge().unwrap();
    assert!(again.converged);
    assert_eq!(again.passes, 1);
    assert_eq!((again.revived, again.killed), (0, 0));
}

#[test]
fn sweeps_alongside_consumers_keep_consumption_exactly_once() {
    const CHAIN: &[&str] = &["가나", "나다", "다라", "라마", "마바", "바사", "사가", "가방"];
    let db = seeded(CHAIN);
    let clock = clock();
    let ledger = Arc::new(ConsumptionLedger::new(
        db.store.clone(),
        unbanned(&clock),
        clock,
        fast_retry(),
    ));
    let engine = engine(&db, 2);

    let racers = 4;
    let start = Barrier::new(racers + 1);
    let done = AtomicBool::new(false);
    let (sweeps, outcomes) = thread::scope(|scope| {
        let sweeper = scope.spawn(|| {
            start.wait();
            let mut sweeps = 0;
            while !done.load(Ordering::SeqCst) {
                engine.converge().unwrap();
                sweeps += 1;
            }
            sweeps
        });
        let handles: Vec<_> = (0..racers)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let start = &start;
                scope.spawn(move || {
                    start.wait();
                    CHAIN
                        .iter()
                        .map(|word| (*word, ledger.try_consume(word, &format!("viewer{i}"))))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let outcomes: Vec<(&str, ConsumeOutcome)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        done.store(true, Ordering::SeqCst);
        (sweeper.join().unwrap(), outcomes)
    });
    assert!(sweeps > 0);

    for word in CHAIN {
        let winners = outcomes
            .iter()
            .filter(|(w, o)| w == word && o.is_success())
            .count();
        assert!(winners <= 1, "{word} consumed {winners} times");
        let node = db.store.lookup(word).unwrap().unwrap();
        assert_eq!(node.consumed, winners == 1, "{word} flag disagrees with outcomes");
    }
    let consumed = db
        .store
        .count_words(&WordFilter::all().consumed(true))
        .unwrap();
    let successes = outcomes.iter().filter(|(_, o)| o.is_success()).count();
    assert_eq!(consumed, successes as u64);

    let report = engine.converge().unwrap();
    assert!(report.converged);
    assert!(fixpoint_violations(db.store.as_ref()).unwrap().is_empty());
}
