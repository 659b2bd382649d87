//! Chat ingestion: sources, normalization and the per-platform supervisor.
//!
//! Each source gets its own task and its own reconnect loop, so one
//! platform's outage never holds up another. The supervisor reports every
//! connect and disconnect to the game, which pauses acceptance only when
//! every platform is offline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;
use wordchain_config::IngestConfig;
use wordchain_types::{ChatMessage, Platform};

use crate::game::GameHandle;

/// Prefix that marks a chat line as a word submission.
pub const WORD_PREFIX: char = '!';
/// Prefix that marks a console line as an admin command.
pub const ADMIN_PREFIX: char = '/';

pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection closed: {0}")]
    Closed(String),
    /// The source will never produce messages again.
    #[error("source finished")]
    Finished,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A live chat feed for one platform.
#[async_trait]
pub trait ChatSource: Send {
    fn platform(&self) -> Platform;

    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Next word submission. `Ok(None)` means the connection ended.
    async fn next_message(&mut self) -> Result<Option<ChatMessage>, SourceError>;
}

/// Strip the command prefix and whitespace, then NFC-normalize.
#[must_use]
pub fn normalize_word(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(WORD_PREFIX).unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.nfc().collect())
}

/// Parse `platform actor !word`, `actor !word` or `!word`.
///
/// Lines without a `!` token are ordinary chat and yield `None`.
#[must_use]
pub fn parse_chat_line(line: &str, default_platform: &Platform) -> Option<ChatMessage> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let at = parts.iter().position(|p| p.starts_with(WORD_PREFIX))?;
    let word = normalize_word(parts[at])?;
    let (platform, actor) = match &parts[..at] {
        [] => (default_platform.clone(), "console"),
        [actor] => (default_platform.clone(), *actor),
        [platform, actor] => (Platform::new(*platform), *actor),
        _ => return None,
    };
    Some(ChatMessage::new(platform, actor, word))
}

/// Line-oriented source over any async reader. Lines starting with `/` are
/// forwarded to the admin channel instead of the game.
pub struct LineChatSource<R> {
    platform: Platform,
    reader: Option<R>,
    admin: Option<mpsc::Sender<String>>,
}

pub type StdinChatSource = LineChatSource<BufReader<Stdin>>;

impl LineChatSource<BufReader<Stdin>> {
    #[must_use]
    pub fn stdin(admin: Option<mpsc::Sender<String>>) -> Self {
        Self::new(Platform::console(), BufReader::new(tokio::io::stdin()), admin)
    }
}

impl<R> LineChatSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(platform: Platform, reader: R, admin: Option<mpsc::Sender<String>>) -> Self {
        Self {
            platform,
            reader: Some(reader),
            admin,
        }
    }
}

#[async_trait]
impl<R> ChatSource for LineChatSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn platform(&self) -> Platform {
        self.platform.clone()
    }

    async fn connect(&mut self) -> Result<(), SourceError> {
        if self.reader.is_some() {
            Ok(())
        } else {
            Err(SourceError::Finished)
        }
    }

    async fn next_message(&mut self) -> Result<Option<ChatMessage>, SourceError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                self.reader = None;
                return Ok(None);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(command) = line.strip_prefix(ADMIN_PREFIX) {
                match &self.admin {
                    Some(admin) => {
                        if admin.send(command.to_string()).await.is_err() {
                            warn!("Admin channel closed, dropping command");
                        }
                    }
                    None => debug!(command, "No admin channel, ignoring command"),
                }
                continue;
            }
            match parse_chat_line(line, &self.platform) {
                Some(message) => return Ok(Some(message)),
                None => debug!(line, "Ignoring chat line"),
            }
        }
    }
}

/// Owns one reconnect loop per chat source.
pub struct IngestSupervisor {
    backoff: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl IngestSupervisor {
    #[must_use]
    pub fn new(backoff: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            backoff,
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(Duration::from_secs(config.reconnect_backoff_secs))
    }

    /// Start a reconnect loop for `source`, feeding `game`.
    pub fn spawn(&mut self, source: Box<dyn ChatSource>, game: GameHandle) {
        let task = tokio::spawn(run_source(
            source,
            game,
            self.backoff,
            Arc::clone(&self.running),
            self.shutdown_tx.subscribe(),
        ));
        self.tasks.push(task);
    }

    /// Stop every loop and wait for them to exit.
    pub async fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
        self.join().await;
    }

    /// Wait until every source has finished. Cancel-safe.
    pub async fn join(&mut self) {
        while let Some(task) = self.tasks.last_mut() {
            if let Err(err) = task.await {
                warn!(error = %err, "Ingest task panicked");
            }
            self.tasks.pop();
        }
    }
}

async fn report(game: &GameHandle, platform: &Platform, online: bool) -> bool {
    game.platform_status(platform.clone(), online).await.is_ok()
}

async fn run_source(
    mut source: Box<dyn ChatSource>,
    game: GameHandle,
    backoff: Duration,
    running: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let platform = source.platform();
    if !report(&game, &platform, false).await {
        return;
    }

    'reconnect: while running.load(Ordering::SeqCst) {
        match source.connect().await {
            Ok(()) => {
                info!(platform = %platform, "Chat source connected");
                if !report(&game, &platform, true).await {
                    break;
                }

                loop {
                    let next = tokio::select! {
                        next = source.next_message() => next,
                        _ = shutdown.changed() => break 'reconnect,
                    };
                    match next {
                        Ok(Some(message)) => match game.submit(message).await {
                            Ok(outcome) => debug!(
                                platform = %platform,
                                outcome = outcome.as_str(),
                                "Submission handled"
                            ),
                            Err(_) => break 'reconnect,
                        },
                        Ok(None) => {
                            info!(platform = %platform, "Chat source disconnected");
                            break;
                        }
                        Err(err) => {
                            warn!(platform = %platform, error = %err, "Chat source failed");
                            break;
                        }
                    }
                }

                if !report(&game, &platform, false).await {
                    break;
                }
            }
            Err(SourceError::Finished) => {
                info!(platform = %platform, "Chat source finished");
                break;
            }
            Err(err) => {
                warn!(platform = %platform, error = %err, "Chat source connect failed");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => break,
        }
    }

    let _ = game.platform_status(platform.clone(), false).await;
    debug!(platform = %platform, "Ingest loop stopped");
}
