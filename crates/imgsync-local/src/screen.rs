//! Metadata screener: layered heuristics that veto candidates whose text metadata points at
//! the wrong subject (documents, maps, places, prose titles, explicit content) or that lack
//! object evidence for curated words.

use crate::knowledge::KnowledgeBase;
use crate::textprep::{contains_any, normalize, word_count};
use imgsync_core::{Candidate, DatasetEntry};
use regex::Regex;
use std::sync::LazyLock;

static CATALOG_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d{6,}\)").unwrap());

/// Normalized title + source page + description + category tags, space-joined.
pub fn combined_text(c: &Candidate) -> String {
    let parts = [
        normalize(&c.title),
        normalize(&c.source_page),
        normalize(&c.description),
        normalize(&c.categories.join(" ")),
    ];
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prose or catalog-record shaped title. `title` must be normalized.
pub fn title_looks_narrative_or_catalog(title: &str) -> bool {
    if title.is_empty() {
        return false;
    }
    let words = word_count(title);
    if words >= 16 {
        return true;
    }
    if title.contains(" is a ") && words >= 10 {
        return true;
    }
    if title.contains(" allows ") || title.contains(" sleeps ") {
        return true;
    }
    if title.matches(',').count() >= 3 && words >= 10 {
        return true;
    }
    CATALOG_ID.is_match(title)
}

/// Place-like wording with no category keyword or word hint to rescue it.
pub fn place_without_object_evidence(kb: &KnowledgeBase, entry: &DatasetEntry, blob: &str) -> bool {
    contains_any(blob, &kb.place_like_tokens) && !kb.has_object_clues(entry, blob)
}

/// Why a candidate was vetoed; `None` means it passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    HardReject,
    Inappropriate,
    NarrativeTitle,
    PlaceWithoutObject,
    MissingAmbiguousHint,
    MissingStrictHint,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::HardReject => "hard_reject_token",
            Rejection::Inappropriate => "inappropriate_token",
            Rejection::NarrativeTitle => "narrative_or_catalog_title",
            Rejection::PlaceWithoutObject => "place_without_object_evidence",
            Rejection::MissingAmbiguousHint => "missing_ambiguous_word_hint",
            Rejection::MissingStrictHint => "missing_strict_word_hint",
        }
    }
}

pub fn screen(kb: &KnowledgeBase, entry: &DatasetEntry, c: &Candidate) -> Option<Rejection> {
    let blob = combined_text(c);

    if contains_any(&blob, &kb.hard_reject_tokens) {
        return Some(Rejection::HardReject);
    }
    if contains_any(&blob, &kb.inappropriate_tokens) {
        return Some(Rejection::Inappropriate);
    }
    if title_looks_narrative_or_catalog(&normalize(&c.title)) {
        return Some(Rejection::NarrativeTitle);
    }
    if place_without_object_evidence(kb, entry, &blob) {
        return Some(Rejection::PlaceWithoutObject);
    }

    // Pictograms are curated by subject already; photos must show hint evidence.
    if !c.provider.is_pictogram() {
        if kb.is_ambiguous(entry) {
            let tokens = kb.core_hint_tokens(entry);
            if !tokens.is_empty() && !contains_any(&blob, &tokens) {
                return Some(Rejection::MissingAmbiguousHint);
            }
        } else if kb.is_strict(entry) {
            let tokens = kb.hint_tokens(entry);
            if !tokens.is_empty() && !contains_any(&blob, &tokens) {
                return Some(Rejection::MissingStrictHint);
            }
        }
    }
    None
}

pub fn is_metadata_bad(kb: &KnowledgeBase, entry: &DatasetEntry, c: &Candidate) -> bool {
    screen(kb, entry, c).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_core::Provider;

    fn entry(word: &str, category: &str) -> DatasetEntry {
        DatasetEntry {
            id: format!("{}_01", word.to_lowercase()),
            word: Some(word.to_string()),
            category: category.to_string(),
            level: 1,
            ..Default::default()
        }
    }

    fn titled(provider: Provider, title: &str) -> Candidate {
        let mut c = Candidate::new(provider, "https://img.example.org/x.jpg");
        c.title = title.to_string();
        c
    }

    #[test]
    fn combined_text_joins_normalized_fields() {
        let mut c = titled(Provider::Wikimedia, "File:Mesa Antigua.JPG");
        c.description = "Una  mesa de  MADERA".into();
        c.categories = vec!["Tables".into(), "Wooden furniture".into()];
        assert_eq!(
            combined_text(&c),
            "file:mesa antigua.jpg una mesa de madera tables wooden furniture"
        );
    }

    #[test]
    fn narrative_and_catalog_titles() {
        assert!(title_looks_narrative_or_catalog(
            "the dog is a small animal that lives in the house"
        ));
        assert!(!title_looks_narrative_or_catalog("the dog is a pet"));
        assert!(title_looks_narrative_or_catalog("cat sleeps on a sofa"));
        assert!(title_looks_narrative_or_catalog(
            "table, chair, lamp, sofa and more furniture in the room"
        ));
        assert!(title_looks_narrative_or_catalog("inventory item (1234567)"));
        assert!(!title_looks_narrative_or_catalog("inventory item (12345)"));
        assert!(title_looks_narrative_or_catalog(
            "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen"
        ));
        assert!(!title_looks_narrative_or_catalog(""));
    }

    #[test]
    fn place_title_without_object_hints_is_rejected() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("RELOJ", "COSAS DE CASA");
        let c = titled(Provider::Openverse, "Plaza Mayor de Valencia, Spain");
        assert_eq!(screen(&kb, &e, &c), Some(Rejection::PlaceWithoutObject));
    }

    #[test]
    fn place_title_is_rescued_by_object_evidence() {
        let kb = KnowledgeBase::from_json(
            r#"{
                "place_like_tokens": ["valencia", "street"],
                "word_object_hints": {"PLAZA": ["town square", "plaza mayor"]}
            }"#,
        )
        .unwrap();
        let e = entry("PLAZA", "LUGARES");
        let c = titled(Provider::Openverse, "Plaza Mayor de Valencia, Spain");
        assert_eq!(screen(&kb, &e, &c), None);
    }

    #[test]
    fn hard_reject_and_inappropriate_are_absolute() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("MESA", "COSAS DE CASA");
        let map = titled(Provider::Arasaac, "Table map of the region");
        assert_eq!(screen(&kb, &e, &map), Some(Rejection::HardReject));
        let nude = titled(Provider::Arasaac, "nude on a table");
        assert_eq!(screen(&kb, &e, &nude), Some(Rejection::Inappropriate));
    }

    #[test]
    fn ambiguous_words_need_first_tier_hints_for_photos() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("MESA", "COSAS DE CASA");
        // Bare word only: not enough for an ambiguous word.
        let bare = titled(Provider::Wikimedia, "Mesa");
        assert_eq!(screen(&kb, &e, &bare), Some(Rejection::MissingAmbiguousHint));
        let ok = titled(Provider::Wikimedia, "Wooden dining table");
        assert_eq!(screen(&kb, &e, &ok), None);
        // Pictograms skip the hint requirement.
        let picto = titled(Provider::Arasaac, "mesa");
        assert_eq!(screen(&kb, &e, &picto), None);
    }

    #[test]
    fn strict_words_accept_bare_word_evidence() {
        let kb = KnowledgeBase::builtin().unwrap();
        let e = entry("Jabón", "BAÑO");
        let bare = titled(Provider::Pexels, "Jabon artesanal");
        assert_eq!(screen(&kb, &e, &bare), None);
        let off = titled(Provider::Pexels, "Handmade craft");
        assert_eq!(screen(&kb, &e, &off), Some(Rejection::MissingStrictHint));
        let uncurated = entry("PLATANO", "COMIDA");
        assert!(!is_metadata_bad(&kb, &uncurated, &off));
    }
}
