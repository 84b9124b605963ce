//! Relevance scoring. Additive/subtractive and pure: the same inputs always produce the same
//! float. Scoring is a ranking signal only; the screener decides pass/fail separately.

use crate::knowledge::KnowledgeBase;
use crate::screen::{combined_text, place_without_object_evidence, title_looks_narrative_or_catalog};
use crate::textprep::{contains_any, contains_token, normalize, word_count};
use imgsync_core::{Candidate, DatasetEntry, Provider};

pub const MAIN_WORD: f64 = 8.0;
pub const CATEGORY_HINT: f64 = 3.5;
pub const CATEGORY_KEYWORD: f64 = 1.25;
pub const WORD_HINT: f64 = 3.0;
pub const NOISY_TOKEN: f64 = -1.0;
pub const HARD_REJECT: f64 = -12.0;
pub const INAPPROPRIATE: f64 = -20.0;
pub const PLACE_WITHOUT_OBJECT: f64 = -8.0;
pub const NARRATIVE_TITLE: f64 = -7.0;
pub const SHORT_TITLE: f64 = 1.4;
pub const LONG_TITLE: f64 = -3.5;
pub const MAX_MEGAPIXEL_BONUS: f64 = 3.0;
pub const QUERY_VERBATIM: f64 = 1.0;

pub fn provider_prior(p: Provider) -> f64 {
    match p {
        Provider::Arasaac => 15.0,
        Provider::Pexels => 2.8,
        Provider::GoogleCse => 2.0,
        Provider::Wikimedia => 1.0,
        Provider::Openverse => 0.0,
    }
}

pub fn score(kb: &KnowledgeBase, c: &Candidate, entry: &DatasetEntry, query: &str) -> f64 {
    let title = normalize(&c.title);
    let blob = combined_text(c);
    let mut s = 0.0;

    let main_word = normalize(&entry.main_word());
    if !main_word.is_empty() && contains_token(&blob, &main_word) {
        s += MAIN_WORD;
    }
    let hint = normalize(kb.category_hint(entry));
    if !hint.is_empty() && contains_token(&blob, &hint) {
        s += CATEGORY_HINT;
    }
    for kw in kb.category_keywords(entry) {
        if contains_token(&blob, kw) {
            s += CATEGORY_KEYWORD;
        }
    }
    for t in kb.hint_tokens(entry) {
        if contains_token(&blob, &t) {
            s += WORD_HINT;
        }
    }
    for t in &kb.noisy_tokens {
        if contains_token(&blob, t) {
            s += NOISY_TOKEN;
        }
    }
    if contains_any(&blob, &kb.hard_reject_tokens) {
        s += HARD_REJECT;
    }
    if contains_any(&blob, &kb.inappropriate_tokens) {
        s += INAPPROPRIATE;
    }
    if place_without_object_evidence(kb, entry, &blob) {
        s += PLACE_WITHOUT_OBJECT;
    }
    if title_looks_narrative_or_catalog(&title) {
        s += NARRATIVE_TITLE;
    }

    match word_count(&title) {
        1..=8 => s += SHORT_TITLE,
        n if n > 14 => s += LONG_TITLE,
        _ => {}
    }

    let megapixels = (f64::from(c.width) * f64::from(c.height)) / 1_000_000.0;
    s += megapixels.min(MAX_MEGAPIXEL_BONUS);

    s += provider_prior(c.provider);

    let q = normalize(query);
    if !q.is_empty() && blob.contains(&q) {
        s += QUERY_VERBATIM;
    }
    s
}

/// Stable descending sort: equal scores keep first-seen (provider/query) order.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}
