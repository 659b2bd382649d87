//! Operator commands accepted on the admin console.
//!
//! Lines are parsed into a typed [`AdminCommand`]; the game loop executes
//! them and answers with an [`AdminReply`].

use chrono::TimeDelta;
use serde::Serialize;
use thiserror::Error;
use wordchain_store::GraphStats;
use wordchain_types::{HistoryEntry, SystemLogEntry, TemporaryBan};

use crate::bans::BanDuration;

pub const DEFAULT_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub usage: &'static str,
    pub description: &'static str,
}

const COMMAND_SPECS: &[CommandSpec] = &[
    CommandSpec {
        usage: "chcw <word>",
        description: "Force the current word",
    },
    CommandSpec {
        usage: "rwt",
        description: "Reset the elapsed-time timer",
    },
    CommandSpec {
        usage: "restart",
        description: "End the current game and start a new one",
    },
    CommandSpec {
        usage: "ac start|stop",
        description: "Toggle answer acceptance",
    },
    CommandSpec {
        usage: "log all|game [n]",
        description: "Show recent audit entries",
    },
    CommandSpec {
        usage: "ban [char] [hours|perm]",
        description: "Ban a terminal syllable (defaults to the current one, permanently)",
    },
    CommandSpec {
        usage: "unban <char>",
        description: "Lift a ban",
    },
    CommandSpec {
        usage: "bans",
        description: "List active bans",
    },
    CommandSpec {
        usage: "stats",
        description: "Show dictionary counters",
    },
    CommandSpec {
        usage: "converge",
        description: "Run liveness convergence in the background",
    },
];

#[must_use]
pub fn command_specs() -> &'static [CommandSpec] {
    COMMAND_SPECS
}

#[must_use]
pub fn command_help() -> String {
    COMMAND_SPECS
        .iter()
        .map(|spec| format!("{:<26}{}", spec.usage, spec.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope {
    /// Game history and system log.
    All,
    /// Game history only.
    Game,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ForceWord(String),
    ResetTimer,
    Restart,
    Accept(bool),
    Log { scope: LogScope, limit: usize },
    /// `None` targets the current terminal syllable.
    Ban { ch: Option<char>, duration: BanDuration },
    Unban(char),
    Bans,
    Stats,
    Converge,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch)
}

fn parse_duration(raw: Option<&str>) -> Result<BanDuration, AdminParseError> {
    const USAGE: &str = "ban [char] [hours|perm]";
    match raw {
        None | Some("perm" | "permanent") => Ok(BanDuration::Permanent),
        Some(hours) => {
            let hours: i64 = hours.parse().map_err(|_| AdminParseError::Usage(USAGE))?;
            if hours <= 0 {
                return Err(AdminParseError::Usage(USAGE));
            }
            TimeDelta::try_hours(hours)
                .map(BanDuration::For)
                .ok_or(AdminParseError::Usage(USAGE))
        }
    }
}

impl AdminCommand {
    /// Parse one console line. A leading `/` is accepted and ignored.
    pub fn parse(line: &str) -> Result<Self, AdminParseError> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let parts: Vec<&str> = line.split_whitespace().collect();

        let Some(&cmd) = parts.first() else {
            return Err(AdminParseError::Empty);
        };
        let arg = |i: usize| parts.get(i).copied();

        match cmd {
            "chcw" => match arg(1) {
                Some(word) if parts.len() == 2 => Ok(Self::ForceWord(word.to_string())),
                _ => Err(AdminParseError::Usage("chcw <word>")),
            },
            "rwt" => Ok(Self::ResetTimer),
            "restart" => Ok(Self::Restart),
            "ac" => match arg(1) {
                Some("start" | "on") => Ok(Self::Accept(true)),
                Some("stop" | "off") => Ok(Self::Accept(false)),
                _ => Err(AdminParseError::Usage("ac start|stop")),
            },
            "log" => {
                let scope = match arg(1) {
                    Some("all") | None => LogScope::All,
                    Some("game") => LogScope::Game,
                    Some(_) => return Err(AdminParseError::Usage("log all|game [n]")),
                };
                let limit = match arg(2) {
                    None => DEFAULT_LOG_LIMIT,
                    Some(n) => n
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(AdminParseError::Usage("log all|game [n]"))?,
                };
                Ok(Self::Log { scope, limit })
            }
            "ban" => {
                let (ch, rest) = match arg(1) {
                    None => (None, None),
                    Some(raw) if raw == "perm" || raw.parse::<i64>().is_ok() => (None, Some(raw)),
                    Some(raw) => {
                        let ch = single_char(raw)
                            .ok_or(AdminParseError::Usage("ban [char] [hours|perm]"))?;
                        (Some(ch), arg(2))
                    }
                };
                Ok(Self::Ban {
                    ch,
                    duration: parse_duration(rest)?,
                })
            }
            "unban" => arg(1)
                .and_then(single_char)
                .map(Self::Unban)
                .ok_or(AdminParseError::Usage("unban <char>")),
            "bans" => Ok(Self::Bans),
            "stats" => Ok(Self::Stats),
            "converge" => Ok(Self::Converge),
            other => Err(AdminParseError::Unknown(other.to_string())),
        }
    }
}

/// Result of an admin command, serializable for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum AdminReply {
    Ok {
        message: String,
    },
    Error {
        message: String,
    },
    Log {
        history: Vec<HistoryEntry>,
        system: Vec<SystemLogEntry>,
    },
    Bans {
        bans: Vec<TemporaryBan>,
    },
    Stats {
        total: u64,
        alive: u64,
        consumed: u64,
        moderated_out: u64,
        playable: u64,
    },
}

impl AdminReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::Ok {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<GraphStats> for AdminReply {
    fn from(stats: GraphStats) -> Self {
        Self::Stats {
            total: stats.total,
            alive: stats.alive,
            consumed: stats.consumed,
            moderated_out: stats.moderated_out,
            playable: stats.playable,
        }
    }
}
