//! Dictionary rows and the derived chaining characters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::WordId;
use crate::phonetic::{first_syllable, last_syllable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordError {
    #[error("word must not be empty")]
    Empty,
    #[error("word '{0}' contains whitespace")]
    Whitespace(String),
}

/// One node of the word graph.
///
/// `alive` is derived state owned by the convergence engine; `consumed` is owned
/// by the consumption ledger and only ever flips false -> true outside a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordNode {
    pub id: WordId,
    pub word: String,
    pub start_char: char,
    pub end_char: char,
    pub alive: bool,
    pub consumed: bool,
    pub consumed_by: Option<String>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub moderation_approved: bool,
    pub source_category: String,
}

impl WordNode {
    /// Approved and unconsumed. Whether it is also alive is a separate question.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.moderation_approved && !self.consumed
    }

    /// Available and alive: the word can currently be played and keeps the game going.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.is_available() && self.alive
    }
}

/// A row to insert into the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWord {
    word: String,
    start_char: char,
    end_char: char,
    source_category: String,
    alive: bool,
    moderation_approved: bool,
}

impl NewWord {
    pub fn new(word: impl Into<String>, source_category: impl Into<String>) -> Result<Self, WordError> {
        let word = word.into().trim().to_string();
        if word.chars().any(char::is_whitespace) {
            return Err(WordError::Whitespace(word));
        }
        let (Some(start_char), Some(end_char)) = (first_syllable(&word), last_syllable(&word)) else {
            return Err(WordError::Empty);
        };
        Ok(Self {
            word,
            start_char,
            end_char,
            source_category: source_category.into(),
            alive: true,
            moderation_approved: true,
        })
    }

    /// Seed the row as dead instead of the import default (alive).
    #[must_use]
    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }

    #[must_use]
    pub fn moderated(mut self) -> Self {
        self.moderation_approved = false;
        self
    }

    #[must_use]
    pub fn word(&self) -> &str {
        &self.word
    }

    #[must_use]
    pub fn start_char(&self) -> char {
        self.start_char
    }

    #[must_use]
    pub fn end_char(&self) -> char {
        self.end_char
    }

    #[must_use]
    pub fn source_category(&self) -> &str {
        &self.source_category
    }

    #[must_use]
    pub fn alive(&self) -> bool {
        self.alive
    }

    #[must_use]
    pub fn moderation_approved(&self) -> bool {
        self.moderation_approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_word_derives_chain_chars() {
        let w = NewWord::new(" 늘보 ", "animal").unwrap();
        assert_eq!(w.word(), "늘보");
        assert_eq!(w.start_char(), '늘');
        assert_eq!(w.end_char(), '보');
        assert!(w.alive());
        assert!(w.moderation_approved());
    }

    #[test]
    fn single_syllable_word_starts_and_ends_on_same_char() {
        let w = NewWord::new("눈", "nature").unwrap();
        assert_eq!(w.start_char(), w.end_char());
    }

    #[test]
    fn rejects_empty_and_spaced_words() {
        assert_eq!(NewWord::new("   ", "x"), Err(WordError::Empty));
        assert!(matches!(NewWord::new("하 늘", "x"), Err(WordError::Whitespace(_))));
    }
}
