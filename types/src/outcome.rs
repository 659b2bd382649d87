//! Outcomes of a consumption attempt and their stable reason strings.
//!
//! Observers (history log, presentation, moderation alerts) key off
//! [`RejectReason::as_str`], so those strings must never change.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Word is not in the dictionary.
    NotFound,
    /// Word was denylisted by moderation.
    ModeratedOut,
    /// Word exists but has no living continuation.
    Dead,
    /// Another submission consumed the word first. Expected under load.
    AlreadyConsumed,
    /// Word ends in a character that is under a temporary ban.
    TemporarilyBanned,
    /// The store could not be reached after retries; the word was not consumed.
    StoreError,
    /// Word does not start with a continuation of the current terminal syllable.
    WrongStart,
    /// Input is not a Hangul word.
    Malformed,
    /// Answer checking is switched off or every platform is offline.
    Paused,
}

impl RejectReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ModeratedOut => "moderated_out",
            Self::Dead => "dead",
            Self::AlreadyConsumed => "already_consumed",
            Self::TemporarilyBanned => "temporarily_banned",
            Self::StoreError => "store_error",
            Self::WrongStart => "wrong_start",
            Self::Malformed => "malformed",
            Self::Paused => "paused",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "not_found" => Self::NotFound,
            "moderated_out" => Self::ModeratedOut,
            "dead" => Self::Dead,
            "already_consumed" => Self::AlreadyConsumed,
            "temporarily_banned" => Self::TemporarilyBanned,
            "store_error" => Self::StoreError,
            "wrong_start" => Self::WrongStart,
            "malformed" => Self::Malformed,
            "paused" => Self::Paused,
            _ => return None,
        })
    }

    /// Losing a race is normal operation and must not be logged as a failure.
    #[must_use]
    pub const fn is_race_loss(self) -> bool {
        matches!(self, Self::AlreadyConsumed)
    }

    /// Player-facing explanation.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::NotFound => "word is not in the dictionary",
            Self::ModeratedOut => "word is not allowed",
            Self::Dead => "word has no continuation",
            Self::AlreadyConsumed => "word was already used",
            Self::TemporarilyBanned => "word ends in a temporarily banned syllable",
            Self::StoreError => "unable to verify the word right now",
            Self::WrongStart => "word does not continue the current word",
            Self::Malformed => "not a Hangul word",
            Self::Paused => "answers are not being accepted",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsumeOutcome {
    /// The word is now consumed; `terminal` is the syllable the next word must continue.
    Success { terminal: char },
    Rejected { reason: RejectReason },
}

impl ConsumeOutcome {
    #[must_use]
    pub const fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Success { .. } => None,
            Self::Rejected { reason } => Some(*reason),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Rejected { reason } => reason.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RejectReason; 9] = [
        RejectReason::NotFound,
        RejectReason::ModeratedOut,
        RejectReason::Dead,
        RejectReason::AlreadyConsumed,
        RejectReason::TemporarilyBanned,
        RejectReason::StoreError,
        RejectReason::WrongStart,
        RejectReason::Malformed,
        RejectReason::Paused,
    ];

    #[test]
    fn reason_strings_are_distinct_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for reason in ALL {
            assert!(seen.insert(reason.as_str()), "duplicate {reason}");
            assert_eq!(RejectReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(RejectReason::parse("success"), None);
    }

    #[test]
    fn only_already_consumed_is_a_race_loss() {
        let losses: Vec<_> = ALL.into_iter().filter(|r| r.is_race_loss()).collect();
        assert_eq!(losses, vec![RejectReason::AlreadyConsumed]);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ConsumeOutcome::rejected(RejectReason::Dead)).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "dead");

        let ok = ConsumeOutcome::Success { terminal: '보' };
        assert_eq!(ok.as_str(), "success");
        assert!(ok.reason().is_none());
    }
}
