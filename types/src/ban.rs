use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum BanExpiry {
    At(DateTime<Utc>),
    /// Manual ban; only `unban` lifts it.
    Permanent,
}

/// A time-boxed suppression of words ending in `ch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryBan {
    pub ch: char,
    pub banned_at: DateTime<Utc>,
    pub expiry: BanExpiry,
}

impl TemporaryBan {
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            BanExpiry::At(at) => now < at,
            BanExpiry::Permanent => true,
        }
    }
}
