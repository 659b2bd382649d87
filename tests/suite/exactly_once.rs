//! Concurrent submissions of the same word.

use std::sync::{Arc, Barrier};
use std::thread;

use wordchain_engine::ConsumptionLedger;
use wordchain_store::WordGraphStore;
use wordchain_types::{ConsumeOutcome, RejectReason};

use crate::common::{clock, fast_retry, seeded, unbanned};

#[test]
fn one_winner_per_word() {
    let db = seeded(&["하늘", "늘보", "보물"]);
    let clock = clock();
    let ledger = Arc::new(ConsumptionLedger::new(
        db.store.clone(),
        unbanned(&clock),
        clock,
        fast_retry(),
    ));

    let racers = 8;
    let start = Barrier::new(racers);
    let outcomes: Vec<ConsumeOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..racers)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let start = &start;
                scope.spawn(move || {
                    start.wait();
                    ledger.try_consume("늘보", &format!("viewer{i}"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = outcomes.iter().filter(|o| o.is_success()).count();
    assert_eq!(winners, 1);
    assert!(
        outcomes
            .iter()
            .filter(|o| !o.is_success())
            .all(|o| o.reason() == Some(RejectReason::AlreadyConsumed))
    );

    let node = db.store.lookup("늘보").unwrap().unwrap();
    assert!(node.consumed);
    assert!(node.consumed_by.as_deref().is_some_and(|by| by.starts_with("viewer")));
}

#[test]
fn second_handle_sees_consumption() {
    let db = seeded(&["하늘", "늘보"]);
    let other = db.reopen();
    let clock = clock();
    let bans = unbanned(&clock);

    let first = ConsumptionLedger::new(db.store.clone(), bans.clone(), clock.clone(), fast_retry());
    let second = ConsumptionLedger::new(other, bans, clock, fast_retry());

    assert_eq!(
        first.try_consume("하늘", "a"),
        ConsumeOutcome::Success { terminal: '늘' }
    );
    assert_eq!(
        second.try_consume("하늘", "b").reason(),
        Some(RejectReason::AlreadyConsumed)
    );
}
