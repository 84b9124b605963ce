//! Minimal, deterministic text normalization helpers.
//!
//! Every matching decision in the ranking passes runs on [`normalize`]d text, and token lookups
//! go through [`contains_token`], which only matches whole tokens (bounded by a non `[a-z0-9]`
//! character or a string edge).

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fallback for [`slug`] when nothing alphanumeric survives.
pub const SLUG_FALLBACK: &str = "general";

/// Compatibility decomposition with combining marks removed ("Baño" -> "Bano").
pub fn deaccent(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Deaccent + lowercase + collapse whitespace runs to one space + trim.
pub fn normalize(s: &str) -> String {
    let lowered = deaccent(s).to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for word in lowered.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Filesystem-safe token: `[a-z0-9]` runs joined by `_`.
pub fn slug(s: &str) -> String {
    let lowered = deaccent(s).to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        out
    }
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit()
}

/// Whole-token containment. `haystack` must already be [`normalize`]d; `token` is normalized
/// here. Multi-word tokens ("town square") match as a phrase.
pub fn contains_token(haystack: &str, token: &str) -> bool {
    let token = normalize(token);
    if haystack.is_empty() || token.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&token) {
        let start = from + pos;
        let end = start + token.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_token_char(c));
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_token_char(c));
        if before_ok && after_ok {
            return true;
        }
        // Advance one char past `start` so overlapping occurrences are still seen.
        from = start
            + haystack[start..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
    }
    false
}

pub fn contains_any<I, S>(haystack: &str, tokens: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .any(|t| contains_token(haystack, t.as_ref()))
}

/// Normalize, drop empties and repeats, keep first-seen order.
pub fn dedupe_tokens<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for t in tokens {
        let clean = normalize(t.as_ref());
        if clean.is_empty() || out.contains(&clean) {
            continue;
        }
        out.push(clean);
    }
    out
}

/// `[a-z0-9]+` runs of an already-normalized string.
pub fn word_count(normalized: &str) -> usize {
    normalized
        .split(|c: char| !is_token_char(c))
        .filter(|w| !w.is_empty())
        .count()
}

/// Strip markup tags, decode HTML entities, and collapse whitespace runs (provider metadata
/// often carries HTML).
pub fn clean_text(s: &str) -> String {
    let text: String = if s.contains('<') || s.contains('&') {
        let frag = html_scraper::Html::parse_fragment(s);
        frag.root_element().text().collect()
    } else {
        s.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
