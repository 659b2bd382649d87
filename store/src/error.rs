use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;
use wordchain_types::WordError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database is busy: {0}")]
    Busy(#[source] rusqlite::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    InvalidWord(#[from] WordError),
}

impl StoreError {
    /// Failures worth retrying at the connection layer.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Busy(_) | Self::Io { .. } | Self::Unavailable(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy(err),
            Some(ErrorCode::CannotOpen | ErrorCode::SystemIoFailure) => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Sqlite(err),
        }
    }
}
