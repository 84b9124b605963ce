//! Query variants for one dataset entry, most targeted first.

use crate::knowledge::KnowledgeBase;
use crate::textprep::{deaccent, normalize};
use imgsync_core::DatasetEntry;

/// Spanish suffix that nudges providers toward real photographs over illustrations.
pub const REAL_PHOTO_SUFFIX: &str = "FOTO REAL";

pub fn build_query(entry: &DatasetEntry) -> String {
    format!(
        "{} {} {REAL_PHOTO_SUFFIX}",
        entry.main_word(),
        entry.category.trim()
    )
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, deduplicated (by normalized value) query strings. Always ends up containing the
/// bare deaccented word when the entry has any word at all.
pub fn build_query_variants(kb: &KnowledgeBase, entry: &DatasetEntry) -> Vec<String> {
    let word = deaccent(&entry.main_word());
    let category = deaccent(&KnowledgeBase::category_key(entry));
    let category_hint = kb.category_hint(entry);
    let hints = kb.word_hints(entry);
    let primary = hints.first().map(String::as_str).unwrap_or("");
    let pair = hints.iter().take(2).map(String::as_str).collect::<Vec<_>>().join(" ");
    let phrase = hints.iter().take(3).map(String::as_str).collect::<Vec<_>>().join(" ");

    let mut raw: Vec<String> = Vec::new();
    // Without curated hints these would all collapse to a generic "photo" query.
    if !primary.is_empty() {
        raw.push(format!("{primary} photo"));
        raw.push(format!("{primary} {category_hint} photo"));
        raw.push(format!("{pair} photo"));
        raw.push(format!("{phrase} object photo"));
    }
    raw.push(build_query(entry));
    raw.push(format!("{word} {category_hint}"));
    raw.push(format!("{word} {category}"));
    raw.push(word);

    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for v in raw {
        let clean = squash(&v);
        if clean.is_empty() {
            continue;
        }
        let key = normalize(&clean);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(clean);
    }
    out
}
