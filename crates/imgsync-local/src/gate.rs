//! Structural and legal filter: MIME, minimum size, license allow-list.
//!
//! Independent of relevance; runs before scoring.

use crate::assets::{effective_mime, ALLOWED_MIME};
use imgsync_core::{Candidate, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub require_free_license: bool,
    /// Google CSE licenses are enforced server-side by its rights filter, not self-reported.
    pub accept_google_rights_filter: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_width: 640,
            min_height: 480,
            require_free_license: true,
            accept_google_rights_filter: true,
        }
    }
}

const FREE_EXACT: [&str; 5] = ["BY", "BY-SA", "CC0", "PDM", "PD"];
const FREE_CONTAINS: [&str; 8] = [
    "CC0",
    "PUBLIC DOMAIN",
    "CC BY",
    "CC-BY",
    "CC BY-SA",
    "CC-BY-SA",
    "PD",
    "GNU FREE DOCUMENTATION",
];

/// License-string allow-list. Anything mentioning `NC` is rejected outright.
pub fn is_free_license(license: &str) -> bool {
    let upper = license
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    if upper.is_empty() || upper.contains("NC") {
        return false;
    }
    if FREE_EXACT.contains(&upper.as_str()) {
        return true;
    }
    if upper.starts_with("BY ") || upper.starts_with("BY-SA ") {
        return true;
    }
    FREE_CONTAINS.iter().any(|t| upper.contains(t))
}

pub fn is_valid(c: &Candidate, cfg: &GateConfig) -> bool {
    if c.image_url.trim().is_empty() {
        return false;
    }
    match effective_mime(c) {
        Some(m) if ALLOWED_MIME.contains(&m.as_str()) => {}
        _ => return false,
    }
    // 0 = unreported; never penalized.
    if c.width != 0 && c.width < cfg.min_width {
        return false;
    }
    if c.height != 0 && c.height < cfg.min_height {
        return false;
    }

    if !cfg.require_free_license {
        return true;
    }
    match c.provider {
        Provider::GoogleCse => cfg.accept_google_rights_filter,
        // Platform licenses are fixed and known-compatible.
        Provider::Arasaac | Provider::Pexels => true,
        Provider::Openverse | Provider::Wikimedia => is_free_license(&c.license),
    }
}
