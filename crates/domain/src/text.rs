//! Text normalization and matching utilities shared by the embedding
//! composer, the rule scorer, and the similar-tender overlap annotation.
//!
//! All matching here is case-insensitive over lowercased input; callers are
//! expected to lowercase once and reuse the result on hot paths.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Collapses repeated whitespace into single spaces and trims the edges.
///
/// Deterministic single-pass scan; all Unicode whitespace normalizes to an
/// ASCII space.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
    }
    out
}

/// Lowercase + whitespace-collapse in one step. This is the normalization
/// applied to every composed embedding text.
pub fn normalize(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// Word-bounded containment check: `needle` must appear in `haystack` with
/// non-alphanumeric characters (or string edges) on both sides. Both inputs
/// are expected to be lowercased already.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(needle) {
        let start = search_from + pos;
        let end = start + needle.len();
        let left_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
        let right_ok = end == haystack.len()
            || haystack[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
        if left_ok && right_ok {
            return true;
        }
        search_from = end;
    }
    false
}

/// English stop words stripped before keyword-overlap comparisons. The list is
/// short on purpose: tender titles are terse and over-filtering hurts recall.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
        "of", "on", "or", "per", "that", "the", "their", "this", "to", "under", "via", "with",
        "will", "shall", "supply", "provision",
    ]
    .into_iter()
    .collect()
});

/// Splits text into lowercase alphanumeric tokens, dropping stop words and
/// one-character fragments. Order is preserved; duplicates are kept (callers
/// that want a set build one).
pub fn keyword_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 1 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}
