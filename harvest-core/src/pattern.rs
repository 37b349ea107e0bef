//! URL pattern derivation.
//!
//! A [`PatternKey`] is the cache key: the URL's host followed by its path
//! segments, with every variable segment collapsed into the [`VARIABLE`]
//! placeholder. Two URLs that differ only in identifier values derive the
//! same key and therefore share one cached extraction routine.
//!
//! Derivation is total: a URL that cannot be parsed degrades to using the
//! raw input string as its key instead of failing.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

use crate::dictionary::{Dictionary, StaticDictionary};
use crate::segment::{SegmentKind, classify};

/// Placeholder token a variable segment is rendered as.
///
/// Both [`SegmentKind::Id`] and [`SegmentKind::Uuid`] collapse into this
/// single token: the distinction matters for classification, not for key
/// identity.
pub const VARIABLE: &str = "{id}";

/// A derived cache key.
///
/// Composed of `hostname` plus `/`-joined classified path segments, e.g.
/// `example.com/users/{id}`. Scheme, port, query string and fragment are
/// never part of a key. Cloning is cheap: short keys are stored inline via
/// [`SmolStr`], longer ones share a reference-counted buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternKey(SmolStr);

impl PatternKey {
    /// Wraps a raw string as a key without derivation.
    ///
    /// This is how degraded keys (unparsable URLs) and keys read back from
    /// storage are constructed. [`PatternBuilder::build`] is the normal way
    /// to obtain a key.
    pub fn new(key: impl Into<SmolStr>) -> Self {
        PatternKey(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatternKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PatternKey {
    fn from(key: &str) -> Self {
        PatternKey::new(key)
    }
}

impl From<String> for PatternKey {
    fn from(key: String) -> Self {
        PatternKey::new(key)
    }
}

/// Derives [`PatternKey`]s from URLs.
///
/// Holds the [`Dictionary`] used for segment classification so that a
/// builder derives identical keys for the lifetime of the process.
///
/// ```
/// use harvest_core::PatternBuilder;
///
/// let builder = PatternBuilder::default();
/// assert_eq!(
///     builder.build("https://example.com/users/123").as_str(),
///     "example.com/users/{id}",
/// );
/// ```
#[derive(Clone)]
pub struct PatternBuilder {
    dictionary: Arc<dyn Dictionary>,
}

impl PatternBuilder {
    /// Creates a builder classifying with the given dictionary.
    pub fn new(dictionary: Arc<dyn Dictionary>) -> Self {
        PatternBuilder { dictionary }
    }

    /// Derives the cache key for a URL.
    ///
    /// Never fails: input that cannot be parsed as a URL (or has no host)
    /// is returned unchanged as a degraded but valid key.
    pub fn build(&self, url: &str) -> PatternKey {
        match self.derive(url) {
            Some(key) => key,
            None => PatternKey::new(url),
        }
    }

    fn derive(&self, url: &str) -> Option<PatternKey> {
        let normalized = ensure_scheme(url);
        let parsed = Url::parse(&normalized).ok()?;
        let host = parsed.host_str()?;

        let mut pattern = String::with_capacity(url.len());
        pattern.push_str(host);

        // Empty segments are dropped: repeated and trailing slashes never
        // influence key identity.
        let segments = parsed
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty());
        for segment in segments {
            pattern.push('/');
            match classify(segment, self.dictionary.as_ref()) {
                SegmentKind::Literal => pattern.push_str(segment),
                SegmentKind::Id | SegmentKind::Uuid => pattern.push_str(VARIABLE),
            }
        }

        Some(PatternKey::new(pattern))
    }
}

impl Default for PatternBuilder {
    fn default() -> Self {
        PatternBuilder::new(Arc::new(StaticDictionary::embedded()))
    }
}

impl fmt::Debug for PatternBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuilder").finish_non_exhaustive()
    }
}

fn ensure_scheme(url: &str) -> Cow<'_, str> {
    let has_scheme = url
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http://"))
        || url
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("https://"));
    if has_scheme {
        Cow::Borrowed(url)
    } else {
        Cow::Owned(format!("https://{url}"))
    }
}
