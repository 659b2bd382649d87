use wordchain_types::WordNode;

/// Predicate over word nodes, shared by the SQLite and in-memory stores.
///
/// Unset fields do not constrain. `start_chars: Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    pub start_chars: Option<Vec<char>>,
    pub excluded_end_chars: Vec<char>,
    pub alive: Option<bool>,
    pub consumed: Option<bool>,
    pub approved: Option<bool>,
}

impl WordFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Approved, alive, unconsumed words starting with any of `chars`.
    #[must_use]
    pub fn playable_from(chars: &[char]) -> Self {
        Self::all()
            .starting_with(chars)
            .approved(true)
            .alive(true)
            .consumed(false)
    }

    pub fn starting_with(mut self, chars: &[char]) -> Self {
        self.start_chars = Some(chars.to_vec());
        self
    }

    pub fn excluding_end(mut self, chars: &[char]) -> Self {
        self.excluded_end_chars.extend_from_slice(chars);
        self
    }

    pub fn alive(mut self, alive: bool) -> Self {
        self.alive = Some(alive);
        self
    }

    pub fn consumed(mut self, consumed: bool) -> Self {
        self.consumed = Some(consumed);
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    /// True when the filter cannot match any row.
    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        self.start_chars.as_ref().is_some_and(Vec::is_empty)
    }

    #[must_use]
    pub fn matches(&self, node: &WordNode) -> bool {
        if let Some(starts) = &self.start_chars
            && !starts.contains(&node.start_char)
        {
            return false;
        }
        if self.excluded_end_chars.contains(&node.end_char) {
            return false;
        }
        self.alive.is_none_or(|v| v == node.alive)
            && self.consumed.is_none_or(|v| v == node.consumed)
            && self.approved.is_none_or(|v| v == node.moderation_approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordchain_types::{NewWord, WordId};

    fn node(word: &str) -> WordNode {
        let new = NewWord::new(word, "noun").unwrap();
        WordNode {
            id: WordId::new(1),
            word: new.word().to_string(),
            start_char: new.start_char(),
            end_char: new.end_char(),
            alive: true,
            consumed: false,
            consumed_by: None,
            consumed_at: None,
            moderation_approved: true,
            source_category: "noun".to_string(),
        }
    }

    #[test]
    fn playable_from_checks_every_flag() {
        let filter = WordFilter::playable_from(&['하']);
        let mut n = node("하늘");
        assert!(filter.matches(&n));

        n.consumed = true;
        assert!(!filter.matches(&n));
        n.consumed = false;
        n.alive = false;
        assert!(!filter.matches(&n));
        n.alive = true;
        n.moderation_approved = false;
        assert!(!filter.matches(&n));
    }

    #[test]
    fn end_exclusion_ignores_start_char() {
        let n = node("하늘");
        assert!(!WordFilter::all().excluding_end(&['늘']).matches(&n));
        assert!(WordFilter::all().excluding_end(&['하']).matches(&n));
    }

    #[test]
    fn empty_start_set_is_vacuous() {
        let filter = WordFilter::all().starting_with(&[]);
        assert!(filter.is_vacuous());
        assert!(!filter.matches(&node("하늘")));
    }
}
