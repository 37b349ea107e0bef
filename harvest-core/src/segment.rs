//! Per-segment URL path classification.
//!
//! Each `/`-delimited path component is classified as either a semantic
//! literal (a category word like `posts`) or a variable identifier (a
//! numeric id, a UUID, a slug-less token). The pattern builder collapses
//! variable segments into a placeholder so that structurally equivalent
//! URLs share one cache key.
//!
//! Classification is a deterministic heuristic: same input, same output,
//! no I/O. Word recognition is delegated to an injected [`Dictionary`].

use percent_encoding::percent_decode_str;

use crate::dictionary::Dictionary;

/// The outcome of classifying one path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// A semantic token that is part of the URL's structure (`posts`, `users`).
    Literal,
    /// A variable identifier (`123`, `a8f3k2j9x`, a single proper noun).
    Id,
    /// A hex-and-hyphen identifier (`123e4567-e89b-...`).
    Uuid,
}

impl SegmentKind {
    /// Returns `true` for the variable kinds (`Id` and `Uuid`).
    pub fn is_variable(self) -> bool {
        !matches!(self, SegmentKind::Literal)
    }
}

/// Common path words that are always treated as literals.
///
/// These override the heuristic entirely: they are structural vocabulary
/// on virtually every site, so misclassifying them as identifiers would
/// fragment cache keys. Kept sorted for binary search.
const STOP_WORDS: &[&str] = &[
    "about",
    "account",
    "admin",
    "api",
    "archive",
    "articles",
    "auth",
    "blog",
    "browse",
    "careers",
    "cart",
    "categories",
    "category",
    "checkout",
    "contact",
    "dashboard",
    "docs",
    "download",
    "events",
    "explore",
    "faq",
    "features",
    "feed",
    "forum",
    "help",
    "home",
    "index",
    "jobs",
    "legal",
    "login",
    "logout",
    "news",
    "posts",
    "press",
    "pricing",
    "privacy",
    "products",
    "profile",
    "projects",
    "register",
    "search",
    "settings",
    "shop",
    "signin",
    "signup",
    "sitemap",
    "store",
    "support",
    "tags",
    "terms",
    "trending",
    "upload",
    "users",
    "wiki",
];

/// Classifies a single path segment.
///
/// Rules are applied in order; the first match wins:
///
/// 1. all decimal digits → [`SegmentKind::Id`]
/// 2. hex-and-hyphen alphabet, length ≥ 8 → [`SegmentKind::Uuid`]
/// 3. length ≥ 20 → [`SegmentKind::Id`]
/// 4. otherwise the word-likelihood heuristic below decides
///
/// The heuristic percent-decodes the segment, rejects opaque binary data,
/// recognizes short dictionary words and stop-list entries, splits
/// compound segments (`my-awesome-post`, `snake_case`, `PascalCase`) and
/// requires every sub-token to be a recognized word for the segment to
/// count as a literal. A single PascalCase word (`Prometheus`) is treated
/// as a proper-noun identifier, not a category word.
pub fn classify(segment: &str, dictionary: &dyn Dictionary) -> SegmentKind {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        return SegmentKind::Id;
    }
    if segment.len() >= 8
        && segment
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b'-')
    {
        return SegmentKind::Uuid;
    }
    if segment.len() >= 20 {
        return SegmentKind::Id;
    }
    word_likelihood(segment, dictionary)
}

fn word_likelihood(segment: &str, dictionary: &dyn Dictionary) -> SegmentKind {
    // Opaque binary that doesn't even decode to UTF-8 is identifier data.
    let decoded = match percent_decode_str(segment).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => return SegmentKind::Id,
    };
    let decoded = decoded.as_ref();

    if decoded.chars().any(|c| !matches!(c, ' '..='~')) {
        return SegmentKind::Id;
    }

    if decoded.len() < 8 {
        return if is_recognized_word(decoded, dictionary) {
            SegmentKind::Literal
        } else {
            SegmentKind::Id
        };
    }

    let lowered = decoded.to_ascii_lowercase();
    if STOP_WORDS.binary_search(&lowered.as_str()).is_ok() {
        return SegmentKind::Literal;
    }

    if let Some(split) = Split::detect(decoded) {
        return match split {
            Split::Pascal(tokens) if tokens.len() == 1 => SegmentKind::Id,
            Split::Pascal(tokens) | Split::Delimited(tokens) => {
                let all_words = !tokens.is_empty()
                    && tokens
                        .iter()
                        .all(|token| is_recognized_word(token, dictionary));
                if all_words {
                    SegmentKind::Literal
                } else {
                    SegmentKind::Id
                }
            }
        };
    }

    let has_letter = decoded.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = decoded.chars().any(|c| c.is_ascii_digit());
    if decoded.chars().all(|c| c.is_ascii_alphanumeric()) && has_letter && has_digit {
        return SegmentKind::Id;
    }

    if !is_recognized_word(decoded, dictionary) {
        return SegmentKind::Id;
    }

    SegmentKind::Literal
}

/// How a compound segment was broken into sub-tokens.
enum Split<'a> {
    /// Split on `-`, `_` or `.`.
    Delimited(Vec<&'a str>),
    /// Split on uppercase boundaries of a PascalCase segment.
    Pascal(Vec<&'a str>),
}

impl<'a> Split<'a> {
    fn detect(segment: &'a str) -> Option<Self> {
        if segment.contains(['-', '_', '.']) {
            let tokens = segment
                .split(['-', '_', '.'])
                .filter(|token| !token.is_empty())
                .collect();
            return Some(Split::Delimited(tokens));
        }
        if is_pascal_case(segment) {
            return Some(Split::Pascal(split_pascal(segment)));
        }
        None
    }
}

fn is_pascal_case(segment: &str) -> bool {
    let mut chars = segment.chars();
    let starts_upper = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    starts_upper
        && segment.chars().all(|c| c.is_ascii_alphabetic())
        && segment.chars().any(|c| c.is_ascii_lowercase())
}

fn split_pascal(segment: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (idx, c) in segment.char_indices().skip(1) {
        if c.is_ascii_uppercase() {
            tokens.push(&segment[start..idx]);
            start = idx;
        }
    }
    tokens.push(&segment[start..]);
    tokens
}

/// Whether a token looks and reads like a word: at least 70% letters and a
/// case-insensitive dictionary hit.
fn is_recognized_word(token: &str, dictionary: &dyn Dictionary) -> bool {
    if token.is_empty() {
        return false;
    }
    let total = token.chars().count();
    let letters = token.chars().filter(|c| c.is_ascii_alphabetic()).count();
    letters as f64 / total as f64 >= 0.7 && dictionary.is_known_word(token)
}
