//! A full game over SQLite: resume, play to a dead end, restart.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::TryRecvError;
use wordchain_engine::{
    ConvergenceOptions, GameDeps, GameSettings, LivenessEngine, TemporaryBanRegistry,
    spawn_audit_writer, spawn_game,
};
use wordchain_store::{AuditStore, BanStore, SessionStore, StateStore};
use wordchain_types::{ChatMessage, GameEvent, GameStateRecord, Platform, RejectReason};

use crate::common::{clock, fast_retry, seeded};

fn chat(actor: &str, word: &str) -> ChatMessage {
    ChatMessage::new(Platform::new("youtube"), actor, word)
}

#[tokio::test]
async fn plays_to_game_over_and_starts_again() {
    let db = seeded(&["시작", "작품", "품다"]);
    db.store
        .save_state(&GameStateRecord::fresh("시작", Utc::now()))
        .unwrap();

    let clock = clock();
    let bans = Arc::new(TemporaryBanRegistry::load(db.store.clone(), clock.clone()).unwrap());
    let (audit, writer) = spawn_audit_writer(db.store.clone(), 64);
    let liveness = Arc::new(LivenessEngine::new(
        db.store.clone(),
        ConvergenceOptions::default(),
    ));
    let deps = GameDeps {
        store: db.store.clone(),
        bans,
        audit,
        clock,
        liveness: Some(liveness),
    };
    let settings = GameSettings {
        retry: fast_retry(),
        ..GameSettings::default()
    };
    let (game, task) = spawn_game(deps, settings).await.unwrap();
    let mut events = game.subscribe();

    assert_eq!(game.snapshot().await.unwrap().current_word, "시작");
    assert_eq!(
        game.submit(chat("a", "품다")).await.unwrap().reason(),
        Some(RejectReason::WrongStart)
    );
    assert!(game.submit(chat("a", "작품")).await.unwrap().is_success());
    assert!(game.submit(chat("b", "품다")).await.unwrap().is_success());

    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    assert!(seen.iter().any(|e| matches!(
        e,
        GameEvent::GameOver { last_word, last_actor: Some(actor), banned: Some('품') }
            if last_word == "품다" && actor == "b"
    )));
    assert!(matches!(seen.last(), Some(GameEvent::GameStarted { word, .. }) if word == "시작"));

    // The auto-ban reached the database.
    assert!(db.store.load_bans().unwrap().iter().any(|ban| ban.ch == '품'));

    let sessions = db.store.recent_sessions(10).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].end_word.as_deref(), Some("품다"));
    assert_eq!(sessions[1].words_played_count, 2);

    game.shutdown().await.unwrap();
    task.await.unwrap();
    drop(game);
    // The writer drains its queue once the game drops the last handle.
    assert!(writer.await.unwrap() >= 4);

    let history = db.store.recent_history(100).unwrap();
    assert_eq!(history.iter().filter(|e| e.status == "success").count(), 2);
    assert!(
        history
            .iter()
            .any(|e| e.input_word == "품다" && e.status == RejectReason::WrongStart.as_str())
    );

    let saved = db.store.load_state().unwrap().unwrap();
    assert_eq!(saved.current_word, "시작");
}
