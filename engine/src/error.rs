use thiserror::Error;
use wordchain_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("game loop has stopped")]
    GameStopped,

    #[error("no start word available: dictionary has no playable word and `{0}` is not in it")]
    NoStartWord(String),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type EngineResult<T> = Result<T, EngineError>;
