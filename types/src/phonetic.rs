//! Initial-sound-law (두음 법칙) expansion of terminal syllables.
//!
//! A word ending in `력` may be continued by a word starting with `력` or `역`;
//! a word ending in `름` may be continued by `름`, `늠`, or `음`. This module
//! computes that continuation set with fixed Hangul block arithmetic.
//!
//! ```text
//! syllable = 0xAC00 + (initial * 588) + (medial * 28) + final
//! ```

use std::fmt;

const HANGUL_BASE: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
const INITIAL_STRIDE: u32 = 588;
const MEDIAL_STRIDE: u32 = 28;

/// ㄴ
const INITIAL_NIEUN: u32 = 2;
/// ㄹ
const INITIAL_RIEUL: u32 = 5;
/// ㅇ (silent)
const INITIAL_IEUNG: u32 = 11;

/// Medials that drop the initial consonant entirely: ㅑ ㅒ ㅕ ㅖ ㅛ ㅠ ㅣ.
const GLIDE_MEDIALS: [u32; 7] = [2, 3, 6, 7, 12, 17, 20];
/// ㅡ after ㄹ admits both the ㄴ and the ㅇ reading.
const DUAL_MEDIALS: [u32; 1] = [18];

const MAX_VARIANTS: usize = 3;

/// Ordered, de-duplicated set of syllables that may start the next word.
///
/// The original syllable is always first. At most three entries exist, so the
/// set lives inline without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Continuations {
    chars: [char; MAX_VARIANTS],
    len: usize,
}

impl Continuations {
    fn single(c: char) -> Self {
        Self {
            chars: [c; MAX_VARIANTS],
            len: 1,
        }
    }

    fn push(&mut self, c: char) {
        if self.contains(c) || self.len == MAX_VARIANTS {
            return;
        }
        self.chars[self.len] = c;
        self.len += 1;
    }

    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        self.as_slice().contains(&c)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[char] {
        &self.chars[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.as_slice().iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The syllable the set was expanded from.
    #[must_use]
    pub fn origin(&self) -> char {
        self.chars[0]
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<char> {
        self.as_slice().to_vec()
    }
}

/// Renders the hint shown next to the current word, e.g. `름/늠/음`.
impl fmt::Display for Continuations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Continuations {
    type Item = &'a char;
    type IntoIter = std::slice::Iter<'a, char>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// Returns true for precomposed Hangul syllables (가..힣).
#[must_use]
pub fn is_hangul_syllable(c: char) -> bool {
    (HANGUL_BASE..=HANGUL_LAST).contains(&u32::from(c))
}

/// Returns true if `word` is non-empty and consists solely of Hangul syllables.
#[must_use]
pub fn is_hangul_word(word: &str) -> bool {
    !word.is_empty() && word.chars().all(is_hangul_syllable)
}

#[must_use]
pub fn first_syllable(word: &str) -> Option<char> {
    word.chars().next()
}

#[must_use]
pub fn last_syllable(word: &str) -> Option<char> {
    word.chars().next_back()
}

/// Expand `c` into every syllable that legally continues it.
///
/// Non-Hangul input is returned unchanged as a single-element set.
#[must_use]
pub fn expand(c: char) -> Continuations {
    let mut out = Continuations::single(c);
    if !is_hangul_syllable(c) {
        return out;
    }

    let code = u32::from(c) - HANGUL_BASE;
    let initial = code / INITIAL_STRIDE;
    let medial = (code % INITIAL_STRIDE) / MEDIAL_STRIDE;
    let final_ = code % MEDIAL_STRIDE;

    let targets: &[u32] = match initial {
        INITIAL_RIEUL if GLIDE_MEDIALS.contains(&medial) => &[INITIAL_IEUNG],
        INITIAL_RIEUL if DUAL_MEDIALS.contains(&medial) => &[INITIAL_NIEUN, INITIAL_IEUNG],
        INITIAL_RIEUL => &[INITIAL_NIEUN],
        INITIAL_NIEUN if GLIDE_MEDIALS.contains(&medial) => &[INITIAL_IEUNG],
        _ => &[],
    };

    for &target in targets {
        let composed = HANGUL_BASE + target * INITIAL_STRIDE + medial * MEDIAL_STRIDE + final_;
        if let Some(variant) = char::from_u32(composed) {
            out.push(variant);
        }
    }
    out
}
