//! Curated lookup tables: per-word object hints, per-category hints/keywords, and the token
//! lists the screener and scorer match against.
//!
//! The tables are data, not behavior. The built-in copy is `data/knowledge.json`, embedded at
//! build time; a maintainer can point `--knowledge` at another file with the same schema.

use crate::textprep::{contains_any, deaccent, dedupe_tokens, normalize};
use imgsync_core::{DatasetEntry, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const BUILTIN_JSON: &str = include_str!("../data/knowledge.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBase {
    pub schema_version: u32,
    /// Category label (upper-cased, accents kept) -> English hint phrase.
    pub category_hints: BTreeMap<String, String>,
    pub category_keywords: BTreeMap<String, Vec<String>>,
    pub noisy_tokens: Vec<String>,
    pub hard_reject_tokens: Vec<String>,
    pub place_like_tokens: Vec<String>,
    pub inappropriate_tokens: Vec<String>,
    /// Deaccented upper-cased word -> object hints, most specific first.
    /// The key set doubles as the "strict" word set.
    pub word_object_hints: BTreeMap<String, Vec<String>>,
    /// Words with several common senses (subset of `word_object_hints` keys).
    pub ambiguous_words: BTreeSet<String>,
    pub arasaac_aliases: BTreeMap<String, Vec<String>>,
}

impl KnowledgeBase {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_JSON)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::NotConfigured(format!("knowledge base: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).map_err(|e| {
            Error::NotConfigured(format!("knowledge base {}: {e}", path.display()))
        })?;
        Self::from_json(&s)
    }

    /// Lookup key for the word tables.
    pub fn word_key(entry: &DatasetEntry) -> String {
        deaccent(&entry.main_word()).to_uppercase()
    }

    pub fn category_key(entry: &DatasetEntry) -> String {
        entry.category.trim().to_uppercase()
    }

    pub fn category_hint(&self, entry: &DatasetEntry) -> &str {
        self.category_hints
            .get(&Self::category_key(entry))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn category_keywords(&self, entry: &DatasetEntry) -> &[String] {
        self.category_keywords
            .get(&Self::category_key(entry))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Raw curated hints for the entry's main word (empty if the word is not curated).
    pub fn word_hints(&self, entry: &DatasetEntry) -> &[String] {
        self.word_object_hints
            .get(&Self::word_key(entry))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First-tier hint tokens only: the curated list without the bare word.
    pub fn core_hint_tokens(&self, entry: &DatasetEntry) -> Vec<String> {
        dedupe_tokens(self.word_hints(entry))
    }

    /// Curated hints plus the bare normalized word.
    pub fn hint_tokens(&self, entry: &DatasetEntry) -> Vec<String> {
        let bare = normalize(&Self::word_key(entry));
        dedupe_tokens(self.word_hints(entry).iter().map(String::as_str).chain([bare.as_str()]))
    }

    pub fn is_ambiguous(&self, entry: &DatasetEntry) -> bool {
        self.ambiguous_words.contains(&Self::word_key(entry))
    }

    pub fn is_strict(&self, entry: &DatasetEntry) -> bool {
        self.word_object_hints.contains_key(&Self::word_key(entry))
    }

    pub fn arasaac_aliases(&self, term: &str) -> &[String] {
        self.arasaac_aliases
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Object evidence: a category keyword or a word-hint token appears in `blob`.
    pub fn has_object_clues(&self, entry: &DatasetEntry, blob: &str) -> bool {
        contains_any(blob, self.category_keywords(entry))
            || contains_any(blob, self.hint_tokens(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(word: &str, category: &str) -> DatasetEntry {
        DatasetEntry {
            id: format!("{}_01", word.to_lowercase()),
            word: Some(word.to_string()),
            category: category.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn builtin_tables_parse_and_are_consistent() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert_eq!(kb.schema_version, 1);
        assert!(kb.word_object_hints.len() > 50);
        for w in &kb.ambiguous_words {
            assert!(
                kb.word_object_hints.contains_key(w),
                "ambiguous word {w} has no hints"
            );
        }
        assert!(kb.hard_reject_tokens.iter().any(|t| t == "map"));
        assert!(kb.place_like_tokens.iter().any(|t| t == "valencia"));
    }

    #[test]
    fn lookups_use_deaccented_word_and_raw_category() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("Lámpara", "cosas de casa");
        assert_eq!(KnowledgeBase::word_key(&e), "LAMPARA");
        assert_eq!(kb.word_hints(&e)[0], "lamp");
        assert_eq!(kb.category_hint(&e), "HOME OBJECT");

        let bath = entry("Jabón", "Baño");
        assert_eq!(kb.category_hint(&bath), "BATHROOM");
        assert!(kb.category_keywords(&bath).iter().any(|k| k == "soap"));
    }

    #[test]
    fn hint_tokens_append_bare_word() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("MESA", "COSAS DE CASA");
        assert_eq!(
            kb.core_hint_tokens(&e),
            vec!["table", "furniture", "desk", "dining"]
        );
        assert_eq!(kb.hint_tokens(&e).last().map(String::as_str), Some("mesa"));
        assert!(kb.is_ambiguous(&e));
        assert!(kb.is_strict(&e));

        let unknown = entry("PLATANO", "COMIDA");
        assert!(kb.core_hint_tokens(&unknown).is_empty());
        assert_eq!(kb.hint_tokens(&unknown), vec!["platano"]);
        assert!(!kb.is_strict(&unknown));
    }

    #[test]
    fn custom_tables_load_from_json() {
        let kb = KnowledgeBase::from_json(
            r#"{"word_object_hints": {"PLAZA": ["town square"]}, "place_like_tokens": ["spain"]}"#,
        )
        .unwrap();
        let e = entry("Plaza", "LUGARES");
        assert_eq!(kb.hint_tokens(&e), vec!["town square", "plaza"]);
        assert!(kb.category_keywords(&e).is_empty());
        assert!(KnowledgeBase::from_json("{not json").is_err());
    }
}
