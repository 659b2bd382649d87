//! The game loop: single owner of the current word and session counters.
//!
//! Every submission, platform status change and admin command is a message
//! on one bounded channel, so the loop never races itself. Store work runs
//! on blocking threads; once issued it runs to completion.
//!
//! Events go out on a broadcast channel. Events sent before a subscriber
//! joins are not replayed; query [`GameHandle::snapshot`] for current state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wordchain_config::WordChainConfig;
use wordchain_store::{GameStore, WordGraphStore};
use wordchain_types::{
    ChatMessage, ConsumeOutcome, GameEvent, GameStateRecord, LogLevel, Platform, RejectReason,
    SessionId, SessionSummary, expand, first_syllable, is_hangul_word, last_syllable,
};

use crate::admin::{AdminCommand, AdminReply, LogScope};
use crate::audit::AuditHandle;
use crate::bans::{AutoBanPolicy, TemporaryBanRegistry};
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::ingest::normalize_word;
use crate::ledger::ConsumptionLedger;
use crate::liveness::LivenessEngine;
use crate::oracle::ReachabilityOracle;
use crate::retry::RetryPolicy;
use crate::run_blocking;

const SYSTEM_ACTOR: &str = "system";
const ADMIN_ACTOR: &str = "admin";
const AUDIT_SOURCE: &str = "game";

#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Used when the dictionary has no playable word left.
    pub start_word: String,
    pub stall_alert: TimeDelta,
    pub stall_check_every: Duration,
    pub auto_ban: AutoBanPolicy,
    pub retry: RetryPolicy,
    pub command_capacity: usize,
    pub event_capacity: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            start_word: "시작".to_string(),
            stall_alert: TimeDelta::hours(1),
            stall_check_every: Duration::from_secs(30),
            auto_ban: AutoBanPolicy::default(),
            retry: RetryPolicy::default(),
            command_capacity: 256,
            event_capacity: 256,
        }
    }
}

impl GameSettings {
    #[must_use]
    pub fn from_config(config: &WordChainConfig) -> Self {
        let game = config.game();
        let stall_secs = i64::try_from(game.stall_alert_secs).unwrap_or(i64::MAX);
        Self {
            start_word: game.start_word,
            stall_alert: TimeDelta::try_seconds(stall_secs).unwrap_or(TimeDelta::MAX),
            auto_ban: AutoBanPolicy::from(&config.bans()),
            retry: RetryPolicy::from(&config.retry()),
            ..Self::default()
        }
    }
}

/// Collaborators the loop is built from.
pub struct GameDeps {
    pub store: Arc<dyn GameStore>,
    pub bans: Arc<TemporaryBanRegistry>,
    pub audit: AuditHandle,
    pub clock: Arc<dyn Clock>,
    /// Target of the `converge` admin command, if any.
    pub liveness: Option<Arc<LivenessEngine>>,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub current_word: String,
    pub terminal_char: Option<char>,
    /// Syllables the next word may start with, e.g. `름/늠/음`.
    pub hint: String,
    /// Answers are checked right now.
    pub accepting: bool,
    /// The admin switch alone, ignoring platform outages.
    pub accepting_answers: bool,
    pub words_played: u64,
    pub fail_count: u64,
    pub last_actor: Option<String>,
    /// Seconds since the current word was set.
    pub elapsed_secs: i64,
    pub uptime_secs: i64,
    pub session_id: Option<SessionId>,
    pub platforms: BTreeMap<Platform, bool>,
}

enum Request {
    Submit {
        message: ChatMessage,
        reply: oneshot::Sender<ConsumeOutcome>,
    },
    PlatformStatus {
        platform: Platform,
        online: bool,
    },
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<AdminReply>,
    },
    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<Request>,
    events: broadcast::Sender<GameEvent>,
}

impl GameHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> EngineResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| EngineError::GameStopped)?;
        rx.await.map_err(|_| EngineError::GameStopped)
    }

    /// Validate and, if legal, play a word.
    pub async fn submit(&self, message: ChatMessage) -> EngineResult<ConsumeOutcome> {
        self.request(|reply| Request::Submit { message, reply })
            .await
    }

    pub async fn platform_status(&self, platform: Platform, online: bool) -> EngineResult<()> {
        self.tx
            .send(Request::PlatformStatus { platform, online })
            .await
            .map_err(|_| EngineError::GameStopped)
    }

    pub async fn admin(&self, command: AdminCommand) -> EngineResult<AdminReply> {
        self.request(|reply| Request::Admin { command, reply })
            .await
    }

    pub async fn snapshot(&self) -> EngineResult<GameSnapshot> {
        self.request(|reply| Request::Snapshot { reply }).await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Ask the loop to persist its state and stop.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.tx
            .send(Request::Shutdown)
            .await
            .map_err(|_| EngineError::GameStopped)
    }
}

/// Resume the saved game (or start a new one) and spawn the loop.
///
/// Fails if the store cannot be read or no start word exists.
pub async fn spawn_game(
    deps: GameDeps,
    settings: GameSettings,
) -> EngineResult<(GameHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(settings.command_capacity.max(1));
    let (events, _) = broadcast::channel(settings.event_capacity.max(1));

    let mut game = Game::new(deps, settings, events.clone());
    game.start().await?;
    let task = tokio::spawn(game.run(rx));

    Ok((GameHandle { tx, events }, task))
}

struct Game {
    store: Arc<dyn GameStore>,
    words: Arc<dyn WordGraphStore>,
    ledger: Arc<ConsumptionLedger>,
    oracle: Arc<ReachabilityOracle>,
    bans: Arc<TemporaryBanRegistry>,
    audit: AuditHandle,
    clock: Arc<dyn Clock>,
    liveness: Option<Arc<LivenessEngine>>,
    settings: GameSettings,
    events: broadcast::Sender<GameEvent>,

    /// Also carries the session counters, so they survive a restart.
    state: GameStateRecord,
    /// Platforms seen so far and whether each is connected.
    platforms: BTreeMap<Platform, bool>,
}

impl Game {
    fn new(deps: GameDeps, settings: GameSettings, events: broadcast::Sender<GameEvent>) -> Self {
        let words: Arc<dyn WordGraphStore> = deps.store.clone();
        let ledger = ConsumptionLedger::new(
            Arc::clone(&words),
            Arc::clone(&deps.bans),
            Arc::clone(&deps.clock),
            settings.retry.clone(),
        );
        let oracle = ReachabilityOracle::new(
            Arc::clone(&words),
            Arc::clone(&deps.bans),
            settings.retry.clone(),
        );
        let now = deps.clock.now();

        Self {
            store: deps.store,
            words,
            ledger: Arc::new(ledger),
            oracle: Arc::new(oracle),
            bans: deps.bans,
            audit: deps.audit,
            clock: deps.clock,
            liveness: deps.liveness,
            settings,
            events,
            state: GameStateRecord::fresh(String::new(), now),
            platforms: BTreeMap::new(),
        }
    }

    async fn start(&mut self) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        let Some(mut saved) = run_blocking(move || store.load_state()).await? else {
            return self.new_game().await;
        };

        let now = self.clock.now();
        saved.process_started_at = now;
        if saved.session_id.is_none() {
            let store = Arc::clone(&self.store);
            let word = saved.current_word.clone();
            saved.session_id = Some(run_blocking(move || store.start_session(&word, now)).await?);
        }
        self.state = saved;
        self.save_state().await?;

        info!(
            word = %self.state.current_word,
            words_played = self.state.words_played,
            fail_count = self.state.fail_count,
            "Resumed game"
        );
        self.audit.system(
            LogLevel::Info,
            AUDIT_SOURCE,
            format!("game resumed at {}", self.state.current_word),
            None,
            now,
        );
        self.emit(GameEvent::GameStarted {
            word: self.state.current_word.clone(),
            hint: self.hint(),
        });
        Ok(())
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        let mut stall = tokio::time::interval(self.settings.stall_check_every);
        stall.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stall.tick().await;

        loop {
            tokio::select! {
                request = rx.recv() => match request {
                    Some(Request::Submit { message, reply }) => {
                        let outcome = self.submit(message).await;
                        let _ = reply.send(outcome);
                    }
                    Some(Request::PlatformStatus { platform, online }) => {
                        self.platform_status(platform, online);
                    }
                    Some(Request::Admin { command, reply }) => {
                        let outcome = self.admin(command).await;
                        let _ = reply.send(outcome);
                    }
                    Some(Request::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Request::Shutdown) | None => break,
                },
                _ = stall.tick() => self.check_stall().await,
            }
        }

        self.persist().await;
        info!("Game loop stopped");
    }

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn terminal_char(&self) -> Option<char> {
        last_syllable(&self.state.current_word)
    }

    fn hint(&self) -> String {
        self.terminal_char()
            .map(|t| expand(t).to_string())
            .unwrap_or_default()
    }

    fn all_platforms_offline(&self) -> bool {
        !self.platforms.is_empty() && self.platforms.values().all(|online| !online)
    }

    fn is_accepting(&self) -> bool {
        self.state.accepting_answers && !self.all_platforms_offline()
    }

    async fn save_state(&self) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        let state = self.state.clone();
        run_blocking(move || store.save_state(&state)).await
    }

    async fn persist(&self) {
        if let Err(err) = self.save_state().await {
            warn!(error = %err, "Failed to persist game state");
        }
    }

    /// Pick a start word, consume it and open a session.
    async fn new_game(&mut self) -> EngineResult<()> {
        let store = Arc::clone(&self.store);
        let word = run_blocking(move || store.random_playable_word())
            .await?
            .unwrap_or_else(|| self.settings.start_word.clone());

        let ledger = Arc::clone(&self.ledger);
        let forced = word.clone();
        let Some(terminal) =
            run_blocking(move || ledger.force_consume(&forced, SYSTEM_ACTOR)).await?
        else {
            return Err(EngineError::NoStartWord(word));
        };

        let now = self.clock.now();
        let store = Arc::clone(&self.store);
        let session_word = word.clone();
        let session = run_blocking(move || store.start_session(&session_word, now)).await?;

        self.state = GameStateRecord {
            current_word: word.clone(),
            last_actor: None,
            last_change_at: now,
            process_started_at: self.state.process_started_at,
            alert_sent: false,
            accepting_answers: self.state.accepting_answers,
            session_id: Some(session),
            words_played: 0,
            fail_count: 0,
        };
        self.save_state().await?;

        info!(word = %word, session = session.value(), "New game started");
        self.audit.system(
            LogLevel::Info,
            AUDIT_SOURCE,
            format!("new game started at {word}"),
            None,
            now,
        );
        self.emit(GameEvent::GameStarted {
            word,
            hint: expand(terminal).to_string(),
        });
        Ok(())
    }

    async fn submit(&mut self, message: ChatMessage) -> ConsumeOutcome {
        let outcome = self.validate_and_consume(&message).await;
        match outcome {
            ConsumeOutcome::Success { terminal } => self.on_accepted(message, terminal).await,
            ConsumeOutcome::Rejected { reason } => self.on_rejected(&message, reason),
        }
        outcome
    }

    async fn validate_and_consume(&self, message: &ChatMessage) -> ConsumeOutcome {
        if !self.is_accepting() {
            return ConsumeOutcome::rejected(RejectReason::Paused);
        }
        if !is_hangul_word(&message.word) {
            return ConsumeOutcome::rejected(RejectReason::Malformed);
        }
        if let (Some(terminal), Some(first)) = (self.terminal_char(), first_syllable(&message.word))
            && !expand(terminal).contains(first)
        {
            return ConsumeOutcome::rejected(RejectReason::WrongStart);
        }

        let ledger = Arc::clone(&self.ledger);
        let word = message.word.clone();
        let actor = message.actor.clone();
        match tokio::task::spawn_blocking(move || ledger.try_consume(&word, &actor)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Consume task failed");
                ConsumeOutcome::rejected(RejectReason::StoreError)
            }
        }
    }

    async fn on_accepted(&mut self, message: ChatMessage, terminal: char) {
        let now = self.clock.now();
        let previous = std::mem::replace(&mut self.state.current_word, message.word.clone());
        self.state.last_actor = Some(message.actor.clone());
        self.state.last_change_at = now;
        self.state.alert_sent = false;
        self.state.words_played += 1;
        self.persist().await;

        info!(
            word = %message.word,
            actor = %message.actor,
            platform = %message.platform,
            "Word accepted"
        );
        self.audit.history(
            &message.actor,
            &message.platform,
            &message.word,
            &previous,
            "success",
            now,
        );
        self.emit(GameEvent::WordAccepted {
            word: message.word,
            actor: message.actor,
            platform: message.platform.clone(),
            hint: expand(terminal).to_string(),
        });

        self.check_continuation(terminal, Some(message.platform)).await;
    }

    fn on_rejected(&mut self, message: &ChatMessage, reason: RejectReason) {
        if reason == RejectReason::Paused {
            debug!(word = %message.word, "Ignored while paused");
            return;
        }
        self.state.fail_count += 1;
        if reason.is_race_loss() {
            debug!(word = %message.word, actor = %message.actor, "Lost consumption race");
        } else {
            info!(
                word = %message.word,
                actor = %message.actor,
                reason = reason.as_str(),
                "Word rejected"
            );
        }
        self.audit.history(
            &message.actor,
            &message.platform,
            &message.word,
            &self.state.current_word,
            reason.as_str(),
            self.clock.now(),
        );
        self.emit(GameEvent::WordRejected {
            word: message.word.clone(),
            actor: message.actor.clone(),
            reason,
        });
    }

    /// Ends the game if `terminal` has no continuation. Returns whether it did.
    async fn check_continuation(&mut self, terminal: char, end_platform: Option<Platform>) -> bool {
        let oracle = Arc::clone(&self.oracle);
        match run_blocking(move || oracle.has_continuation(terminal)).await {
            Ok(true) => false,
            Ok(false) => {
                self.game_over(end_platform, true).await;
                true
            }
            Err(err) => {
                warn!(
                    terminal = %terminal,
                    error = %err,
                    "Unable to verify continuation, game continues"
                );
                false
            }
        }
    }

    async fn game_over(&mut self, end_platform: Option<Platform>, auto_ban: bool) {
        let now = self.clock.now();
        let last_word = self.state.current_word.clone();
        let last_actor = self.state.last_actor.clone();

        let banned = if auto_ban {
            let words = Arc::clone(&self.words);
            let bans = Arc::clone(&self.bans);
            let policy = self.settings.auto_ban;
            let ending = last_word.clone();
            match run_blocking(move || policy.evaluate(words.as_ref(), &bans, &ending)).await {
                Ok(banned) => banned,
                Err(err) => {
                    warn!(error = %err, "Auto-ban check failed");
                    None
                }
            }
        } else {
            None
        };

        if let Some(id) = self.state.session_id {
            let summary = SessionSummary {
                ended_at: now,
                words_played_count: self.state.words_played,
                fail_count: self.state.fail_count,
                end_word: last_word.clone(),
                end_platform: end_platform.map(|p| p.to_string()),
                end_user: last_actor.clone(),
            };
            let store = Arc::clone(&self.store);
            if let Err(err) = run_blocking(move || store.end_session(id, &summary)).await {
                warn!(session = id.value(), error = %err, "Failed to close session");
            }
        }

        info!(word = %last_word, banned = ?banned, "Game over");
        self.audit.system(
            LogLevel::Info,
            AUDIT_SOURCE,
            format!("game over at {last_word}"),
            banned.map(|ch| format!("auto-banned {ch}")),
            now,
        );
        self.emit(GameEvent::GameOver {
            last_word,
            last_actor,
            banned,
        });

        if let Err(err) = self.new_game().await {
            error!(error = %err, "Failed to start a new game");
            self.audit.system(
                LogLevel::Error,
                AUDIT_SOURCE,
                "failed to start a new game",
                Some(err.to_string()),
                now,
            );
        }
    }

    async fn check_stall(&mut self) {
        if self.state.alert_sent {
            return;
        }
        let now = self.clock.now();
        let stalled = now - self.state.last_change_at;
        if stalled < self.settings.stall_alert {
            return;
        }

        self.state.alert_sent = true;
        self.persist().await;
        let stalled_secs = stalled.num_seconds().max(0) as u64;
        warn!(word = %self.state.current_word, stalled_secs, "Game has stalled");
        self.audit.system(
            LogLevel::Warn,
            AUDIT_SOURCE,
            format!("no word accepted for {stalled_secs}s"),
            Some(self.state.current_word.clone()),
            now,
        );
        self.emit(GameEvent::StallAlert {
            word: self.state.current_word.clone(),
            stalled_secs,
        });
    }

    fn emit_acceptance_change(&self, was_accepting: bool, why: &str) {
        let accepting = self.is_accepting();
        if accepting == was_accepting {
            return;
        }
        info!(accepting, why, "Answer acceptance changed");
        self.audit.system(
            LogLevel::Info,
            AUDIT_SOURCE,
            if accepting { "acceptance resumed" } else { "acceptance paused" },
            Some(why.to_string()),
            self.clock.now(),
        );
        self.emit(if accepting {
            GameEvent::AcceptanceResumed
        } else {
            GameEvent::AcceptancePaused
        });
    }

    fn platform_status(&mut self, platform: Platform, online: bool) {
        let was_accepting = self.is_accepting();
        if self.platforms.insert(platform.clone(), online) != Some(online) {
            info!(platform = %platform, online, "Platform status changed");
            self.emit(GameEvent::PlatformStatus { platform, online });
        }
        self.emit_acceptance_change(was_accepting, "platform status");
    }

    async fn admin(&mut self, command: AdminCommand) -> AdminReply {
        debug!(command = ?command, "Admin command");
        match command {
            AdminCommand::ForceWord(raw) => self.force_word(&raw).await,
            AdminCommand::ResetTimer => {
                self.state.last_change_at = self.clock.now();
                self.state.alert_sent = false;
                self.persist().await;
                AdminReply::ok("timer reset")
            }
            AdminCommand::Restart => {
                self.game_over(None, false).await;
                AdminReply::ok(format!("new game started at {}", self.state.current_word))
            }
            AdminCommand::Accept(on) => {
                let was_accepting = self.is_accepting();
                self.state.accepting_answers = on;
                self.persist().await;
                self.emit_acceptance_change(was_accepting, "admin");
                AdminReply::ok(if on { "accepting answers" } else { "answers paused" })
            }
            AdminCommand::Log { scope, limit } => {
                let store = Arc::clone(&self.store);
                let result = run_blocking(move || {
                    let history = store.recent_history(limit)?;
                    let system = match scope {
                        LogScope::All => store.recent_system_logs(limit)?,
                        LogScope::Game => Vec::new(),
                    };
                    Ok((history, system))
                })
                .await;
                match result {
                    Ok((history, system)) => AdminReply::Log { history, system },
                    Err(err) => AdminReply::error(format!("unable to read log: {err}")),
                }
            }
            AdminCommand::Ban { ch, duration } => {
                let Some(ch) = ch.or_else(|| self.terminal_char()) else {
                    return AdminReply::error("no current syllable to ban");
                };
                let bans = Arc::clone(&self.bans);
                match run_blocking(move || Ok(bans.ban(ch, duration))).await {
                    Ok(ban) => {
                        self.audit.system(
                            LogLevel::Info,
                            AUDIT_SOURCE,
                            format!("banned {ch}"),
                            Some(format!("{:?}", ban.expiry)),
                            ban.banned_at,
                        );
                        AdminReply::ok(format!("banned {ch}"))
                    }
                    Err(err) => AdminReply::error(format!("unable to ban {ch}: {err}")),
                }
            }
            AdminCommand::Unban(ch) => {
                let bans = Arc::clone(&self.bans);
                match run_blocking(move || Ok(bans.unban(ch))).await {
                    Ok(true) => AdminReply::ok(format!("unbanned {ch}")),
                    Ok(false) => AdminReply::ok(format!("{ch} was not banned")),
                    Err(err) => AdminReply::error(format!("unable to unban {ch}: {err}")),
                }
            }
            AdminCommand::Bans => {
                let bans = Arc::clone(&self.bans);
                match run_blocking(move || Ok(bans.list_active())).await {
                    Ok(bans) => AdminReply::Bans { bans },
                    Err(err) => AdminReply::error(format!("unable to list bans: {err}")),
                }
            }
            AdminCommand::Stats => {
                let words = Arc::clone(&self.words);
                match run_blocking(move || words.stats()).await {
                    Ok(stats) => stats.into(),
                    Err(err) => AdminReply::error(format!("unable to read stats: {err}")),
                }
            }
            AdminCommand::Converge => {
                let Some(engine) = self.liveness.clone() else {
                    return AdminReply::error("liveness engine is not configured");
                };
                tokio::spawn(async move {
                    match run_blocking(move || engine.converge()).await {
                        Ok(report) => info!(
                            passes = report.passes,
                            revived = report.revived,
                            killed = report.killed,
                            converged = report.converged,
                            "Requested convergence finished"
                        ),
                        Err(err) => warn!(error = %err, "Requested convergence failed"),
                    }
                });
                AdminReply::ok("convergence started")
            }
        }
    }

    async fn force_word(&mut self, raw: &str) -> AdminReply {
        let Some(word) = normalize_word(raw) else {
            return AdminReply::error("usage: chcw <word>");
        };
        let ledger = Arc::clone(&self.ledger);
        let forced = word.clone();
        let terminal = match run_blocking(move || ledger.force_consume(&forced, ADMIN_ACTOR)).await {
            Ok(Some(terminal)) => terminal,
            Ok(None) => return AdminReply::error(format!("{word} is not in the dictionary")),
            Err(err) => return AdminReply::error(format!("unable to set {word}: {err}")),
        };

        let now = self.clock.now();
        self.state.current_word.clone_from(&word);
        self.state.last_actor = Some(ADMIN_ACTOR.to_string());
        self.state.last_change_at = now;
        self.state.alert_sent = false;
        self.persist().await;

        info!(word = %word, "Current word forced");
        self.audit.system(
            LogLevel::Info,
            AUDIT_SOURCE,
            format!("current word forced to {word}"),
            None,
            now,
        );
        self.emit(GameEvent::WordAccepted {
            word: word.clone(),
            actor: ADMIN_ACTOR.to_string(),
            platform: Platform::console(),
            hint: expand(terminal).to_string(),
        });

        if self.check_continuation(terminal, None).await {
            AdminReply::ok(format!(
                "{word} has no continuation; new game started at {}",
                self.state.current_word
            ))
        } else {
            AdminReply::ok(format!("current word set to {word}"))
        }
    }

    fn snapshot(&self) -> GameSnapshot {
        let now = self.clock.now();
        GameSnapshot {
            current_word: self.state.current_word.clone(),
            terminal_char: self.terminal_char(),
            hint: self.hint(),
            accepting: self.is_accepting(),
            accepting_answers: self.state.accepting_answers,
            words_played: self.state.words_played,
            fail_count: self.state.fail_count,
            last_actor: self.state.last_actor.clone(),
            elapsed_secs: (now - self.state.last_change_at).num_seconds(),
            uptime_secs: (now - self.state.process_started_at).num_seconds(),
            session_id: self.state.session_id,
            platforms: self.platforms.clone(),
        }
    }
}
