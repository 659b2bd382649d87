//! Core engine for the word-chain game.
//!
//! This crate holds the decision path (ledger, reachability, bans), the
//! liveness convergence engine and the async game loop that ties them to
//! chat ingestion. Store access is synchronous; async code reaches it
//! through [`run_blocking`].

pub mod admin;
pub mod audit;
pub mod bans;
pub mod clock;
mod error;
pub mod game;
pub mod ingest;
pub mod ledger;
pub mod liveness;
pub mod oracle;
pub mod retry;

pub use admin::{AdminCommand, AdminParseError, AdminReply, LogScope};
pub use audit::{AuditHandle, spawn_audit_writer};
pub use bans::{AutoBanPolicy, BanDuration, TemporaryBanRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use game::{GameDeps, GameHandle, GameSettings, GameSnapshot, spawn_game};
pub use ingest::{ChatSource, IngestSupervisor, LineChatSource, SourceError, StdinChatSource};
pub use ledger::ConsumptionLedger;
pub use liveness::{ConvergenceOptions, ConvergenceReport, LivenessEngine, spawn_periodic};
pub use oracle::ReachabilityOracle;
pub use retry::RetryPolicy;

use wordchain_store::StoreResult;

/// Run a store operation on the blocking pool.
pub async fn run_blocking<T, F>(op: F) -> EngineResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(op).await??)
}
