//! MIME helpers and the deterministic on-disk layout of downloaded assets.

use crate::textprep::slug;
use imgsync_core::Candidate;

pub const ALLOWED_MIME: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Best-effort MIME from the URL path extension.
pub fn infer_mime_from_url(url: &str) -> Option<&'static str> {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase(),
    };
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        Some("image/jpeg")
    } else if path.ends_with(".png") {
        Some("image/png")
    } else if path.ends_with(".webp") {
        Some("image/webp")
    } else {
        None
    }
}

/// Reported MIME, else inferred from the URL.
pub fn effective_mime(c: &Candidate) -> Option<String> {
    c.mime
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.to_ascii_lowercase())
        .or_else(|| infer_mime_from_url(&c.image_url).map(str::to_string))
}

pub fn mime_to_ext(mime: &str) -> &'static str {
    match mime {
        "image/png" => ".png",
        "image/webp" => ".webp",
        _ => ".jpg",
    }
}

/// `<images_dir>/<category-slug>/<entry-id-slug>.<ext>`, always with `/` separators so the
/// value can be written into the dataset as-is.
pub fn asset_relative_path(images_dir: &str, category: &str, entry_id: &str, mime: &str) -> String {
    let dir = images_dir.trim().trim_matches('/');
    let file = format!("{}{}", slug(entry_id), mime_to_ext(mime));
    if dir.is_empty() {
        format!("{}/{file}", slug(category))
    } else {
        format!("{dir}/{}/{file}", slug(category))
    }
}
