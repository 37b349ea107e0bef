//! Word-likelihood oracle used by segment classification.
//!
//! The classifier itself only performs structural checks (letter ratios,
//! delimiters, length). Whether a token is an actual word is delegated to
//! the [`Dictionary`] capability, which keeps the classifier pure and lets
//! tests substitute a stub oracle.

use std::collections::HashSet;
use std::sync::Arc;

use smol_str::SmolStr;

/// Capability trait answering "is this token a known word?".
///
/// Implementations must be **total** (never panic on any input) and
/// **case-insensitive**. A static word list is sufficient; a spell-check
/// service would work just as well behind this interface.
pub trait Dictionary: Send + Sync {
    /// Returns `true` if the token is a recognized word, ignoring case.
    fn is_known_word(&self, token: &str) -> bool;
}

impl Dictionary for &dyn Dictionary {
    fn is_known_word(&self, token: &str) -> bool {
        (*self).is_known_word(token)
    }
}

impl Dictionary for Box<dyn Dictionary> {
    fn is_known_word(&self, token: &str) -> bool {
        (**self).is_known_word(token)
    }
}

impl Dictionary for Arc<dyn Dictionary> {
    fn is_known_word(&self, token: &str) -> bool {
        (**self).is_known_word(token)
    }
}

/// Dictionary backed by an in-memory word set.
///
/// The default construction loads an embedded list of common English and
/// web-navigation words. Custom lists can be supplied with
/// [`StaticDictionary::from_words`].
///
/// ```
/// use harvest_core::{Dictionary, StaticDictionary};
///
/// let dict = StaticDictionary::embedded();
/// assert!(dict.is_known_word("posts"));
/// assert!(dict.is_known_word("POSTS"));
/// assert!(!dict.is_known_word("xjqwzkpt"));
/// ```
#[derive(Debug, Clone)]
pub struct StaticDictionary {
    words: HashSet<SmolStr>,
}

impl StaticDictionary {
    /// Builds a dictionary from the embedded word list.
    pub fn embedded() -> Self {
        Self::from_words(include_str!("words.txt").lines())
    }

    /// Builds a dictionary from an arbitrary iterator of words.
    ///
    /// Words are stored lowercased; lookups are case-insensitive.
    pub fn from_words<I, W>(words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| SmolStr::new(w.as_ref().trim().to_ascii_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        StaticDictionary { words }
    }

    /// Number of distinct words in the dictionary.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if the dictionary contains no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StaticDictionary {
    fn default() -> Self {
        Self::embedded()
    }
}

impl Dictionary for StaticDictionary {
    fn is_known_word(&self, token: &str) -> bool {
        self.words.contains(token.to_ascii_lowercase().as_str())
    }
}
