//! wordchain CLI - binary entry point.
//!
//! ```text
//! main() -> init_tracing() -> load config -> open store -> subcommand
//!   play      game loop fed by stdin chat lines and `/` admin commands
//!   converge  one liveness recomputation, report printed as JSON
//!   stats     dictionary counters
//!   reset     forget consumption, sessions, audit history and saved state
//! ```
//!
//! Everything the game emits (events, admin replies, snapshots) goes to
//! stdout as one JSON object per line. Diagnostics go to the log file.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wordchain_config::{CONFIG_ENV, WordChainConfig, data_dir};
use wordchain_engine::{
    AdminCommand, AdminReply, Clock, ConvergenceOptions, GameDeps, GameHandle,
    GameSettings, IngestSupervisor, LivenessEngine, StdinChatSource, SystemClock,
    TemporaryBanRegistry, admin::command_help, run_blocking, spawn_audit_writer, spawn_game,
    spawn_periodic,
};
use wordchain_store::{AuditStore, SessionStore, SqliteStore, StateStore, WordGraphStore};
use wordchain_types::GameEvent;

/// How long runtime shutdown waits for blocking work such as the stdin reader.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
const ADMIN_QUEUE: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "wordchain", version, about = "Korean word-chain game validator")]
struct Cli {
    /// Config file (defaults to ~/.wordchain/config.toml)
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Dictionary database, overriding the config file
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the game, reading `[platform] actor !word` lines from stdin
    Play,
    /// Recompute liveness flags and print the report
    Converge {
        /// Mark every word alive before converging
        #[arg(long)]
        from_top: bool,
    },
    /// Print dictionary counters
    Stats,
    /// Clear consumption, sessions, audit history and the saved game
    Reset {
        /// Required; reset cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            warn!("{warning}");
        }
        return;
    }

    // stdout carries JSON output, so diagnostics fall back to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    vec![
        // Primary: ~/.wordchain/logs/wordchain.log
        data_dir().join("logs").join("wordchain.log"),
        // Fallback: ./.wordchain/logs/wordchain.log
        PathBuf::from(".wordchain").join("logs").join("wordchain.log"),
    ]
}

fn load_config(path: Option<&Path>) -> Result<WordChainConfig> {
    let config = match path {
        Some(path) => Some(
            WordChainConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
        ),
        None => WordChainConfig::load().context("failed to load config")?,
    };
    Ok(config.unwrap_or_default())
}

fn open_store(db: Option<&Path>, config: &WordChainConfig) -> Result<Arc<SqliteStore>> {
    let path = db.map_or_else(|| config.store_path(), Path::to_path_buf);
    let store = SqliteStore::open_with_timeout(&path, config.busy_timeout())
        .with_context(|| format!("failed to open word store at {}", path.display()))?;
    info!(path = %path.display(), "Word store opened");
    Ok(Arc::new(store))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => warn!(error = %err, "Failed to encode output"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // The stdin reader sits in a blocking read that nothing can interrupt.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = open_store(cli.db.as_deref(), &config)?;

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => play(&config, store).await,
        Command::Converge { from_top } => converge(&config, store, from_top).await,
        Command::Stats => {
            let stats = run_blocking(move || store.stats()).await?;
            print_json(&AdminReply::from(stats));
            Ok(())
        }
        Command::Reset { yes } => reset(store, yes).await,
    }
}

async fn play(config: &WordChainConfig, store: Arc<SqliteStore>) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bans = {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        run_blocking(move || TemporaryBanRegistry::load(store, clock))
            .await
            .context("failed to load bans")?
    };

    let (audit, audit_task) = spawn_audit_writer(store.clone(), config.audit().queue_capacity);
    let liveness = Arc::new(LivenessEngine::new(
        store.clone(),
        ConvergenceOptions::from(&config.liveness()),
    ));

    let deps = GameDeps {
        store,
        bans: Arc::new(bans),
        audit,
        clock,
        liveness: Some(Arc::clone(&liveness)),
    };
    let (game, game_task) = spawn_game(deps, GameSettings::from_config(config))
        .await
        .context("failed to start the game")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let interval_secs = config.liveness().interval_secs;
    let periodic = (interval_secs > 0).then(|| {
        spawn_periodic(
            Arc::clone(&liveness),
            Duration::from_secs(interval_secs),
            stop_rx,
        )
    });

    let printer = tokio::spawn(print_events(game.subscribe()));
    print_json(&game.snapshot().await?);

    let (admin_tx, admin_rx) = mpsc::channel(ADMIN_QUEUE);
    let console = tokio::spawn(run_console(game.clone(), admin_rx));

    let mut supervisor = IngestSupervisor::from_config(&config.ingest());
    supervisor.spawn(Box::new(StdinChatSource::stdin(Some(admin_tx))), game.clone());

    tokio::select! {
        () = supervisor.join() => info!("Input closed"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "Failed to listen for Ctrl-C");
            }
            info!("Interrupted");
        }
    }

    supervisor.shutdown().await;
    let _ = stop_tx.send(true);
    liveness.cancel();
    if let Some(periodic) = periodic
        && let Err(err) = periodic.await
    {
        warn!(error = %err, "Liveness task panicked");
    }

    shutdown_game(game, game_task, console).await;
    if let Err(err) = printer.await {
        warn!(error = %err, "Event printer panicked");
    }
    match audit_task.await {
        Ok(written) => info!(written, "Audit log flushed"),
        Err(err) => warn!(error = %err, "Audit writer panicked"),
    }
    Ok(())
}

async fn shutdown_game(
    game: GameHandle,
    game_task: tokio::task::JoinHandle<()>,
    console: tokio::task::JoinHandle<()>,
) {
    if let Err(err) = game.shutdown().await {
        warn!(error = %err, "Game already stopped");
    }
    if let Err(err) = game_task.await {
        warn!(error = %err, "Game task panicked");
    }
    drop(game);
    if let Err(err) = console.await {
        warn!(error = %err, "Admin console panicked");
    }
}

async fn print_events(mut events: broadcast::Receiver<GameEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_json(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Execute `/` lines forwarded by the stdin source.
async fn run_console(game: GameHandle, mut lines: mpsc::Receiver<String>) {
    while let Some(line) = lines.recv().await {
        let trimmed = line.trim().trim_start_matches('/');
        if trimmed == "help" {
            println!("{}", command_help());
            continue;
        }

        let reply = match AdminCommand::parse(&line) {
            Ok(command) => {
                info!(?command, "Admin command");
                match game.admin(command).await {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(error = %err, "Admin command dropped");
                        break;
                    }
                }
            }
            Err(err) => AdminReply::error(err.to_string()),
        };
        print_json(&reply);
    }
}

async fn converge(config: &WordChainConfig, store: Arc<SqliteStore>, from_top: bool) -> Result<()> {
    let engine = Arc::new(LivenessEngine::new(
        store,
        ConvergenceOptions::from(&config.liveness()),
    ));

    let cancel = Arc::clone(&engine);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current window");
            cancel.cancel();
        }
    });

    let report = run_blocking(move || {
        if from_top {
            engine.recompute_from_top()
        } else {
            engine.converge()
        }
    })
    .await
    .context("liveness convergence failed");
    interrupt.abort();

    let report = report?;
    info!(
        passes = report.passes,
        revived = report.revived,
        killed = report.killed,
        converged = report.converged,
        "Convergence finished"
    );
    print_json(&report);
    Ok(())
}

async fn reset(store: Arc<SqliteStore>, yes: bool) -> Result<()> {
    if !yes {
        bail!("reset clears every consumed word and all play history; pass --yes to confirm");
    }

    let (words, sessions, audit) = run_blocking(move || {
        let words = store.reset_consumption()?;
        let sessions = store.clear_sessions()?;
        let audit = store.clear_audit()?;
        store.clear_state()?;
        Ok((words, sessions, audit))
    })
    .await
    .context("reset failed")?;

    info!(words, sessions, audit, "Store reset");
    print_json(&serde_json::json!({
        "words_released": words,
        "sessions_cleared": sessions,
        "audit_entries_cleared": audit,
    }));
    Ok(())
}
