//! Pixel-statistics check for downloads that look like scanned pages or text documents.
//!
//! The thresholds are empirical. They are kept configurable rather than derived, and the
//! detector fails open: undecodable bytes (or a build without the `visual` feature) are never
//! flagged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentThresholds {
    /// Longest side after downsampling.
    pub max_side: u32,
    /// Every channel above this counts as near-white.
    pub white_level: u8,
    /// Every channel below this counts as near-black.
    pub dark_level: u8,
    /// Max-min channel spread above this counts as colorful.
    pub colorful_spread: u8,
    /// Pairwise channel deltas all below this count as near-gray.
    pub gray_delta: u8,
    pub paper_white_min: f64,
    pub paper_colorful_max: f64,
    pub paper_dark_min: f64,
    pub gray_min: f64,
    pub gray_colorful_max: f64,
}

impl Default for DocumentThresholds {
    fn default() -> Self {
        Self {
            max_side: 256,
            white_level: 235,
            dark_level: 50,
            colorful_spread: 35,
            gray_delta: 12,
            paper_white_min: 0.58,
            paper_colorful_max: 0.08,
            paper_dark_min: 0.005,
            gray_min: 0.92,
            gray_colorful_max: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelStats {
    pub white: f64,
    pub dark: f64,
    pub colorful: f64,
    pub gray: f64,
}

impl PixelStats {
    pub fn from_rgb<I>(pixels: I, t: &DocumentThresholds) -> Option<Self>
    where
        I: IntoIterator<Item = [u8; 3]>,
    {
        let (mut total, mut white, mut dark, mut colorful, mut gray) = (0u64, 0u64, 0u64, 0u64, 0u64);
        for [r, g, b] in pixels {
            total += 1;
            if r > t.white_level && g > t.white_level && b > t.white_level {
                white += 1;
            }
            if r < t.dark_level && g < t.dark_level && b < t.dark_level {
                dark += 1;
            }
            if r.max(g).max(b) - r.min(g).min(b) > t.colorful_spread {
                colorful += 1;
            }
            if r.abs_diff(g) < t.gray_delta && g.abs_diff(b) < t.gray_delta && r.abs_diff(b) < t.gray_delta {
                gray += 1;
            }
        }
        if total == 0 {
            return None;
        }
        let n = total as f64;
        Some(Self {
            white: white as f64 / n,
            dark: dark as f64 / n,
            colorful: colorful as f64 / n,
            gray: gray as f64 / n,
        })
    }

    /// White paper with some ink and little color, or an almost entirely gray image.
    pub fn is_document_like(&self, t: &DocumentThresholds) -> bool {
        let paper = self.white > t.paper_white_min
            && self.colorful < t.paper_colorful_max
            && self.dark > t.paper_dark_min;
        let grayscale = self.gray > t.gray_min && self.colorful < t.gray_colorful_max;
        paper || grayscale
    }
}

/// Whether this build can decode images at all.
pub const fn available() -> bool {
    cfg!(feature = "visual")
}

#[cfg(feature = "visual")]
pub fn looks_like_text_document(bytes: &[u8], t: &DocumentThresholds) -> bool {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, "image decode failed; not treating as document");
            return false;
        }
    };
    let img = if img.width() > t.max_side || img.height() > t.max_side {
        img.thumbnail(t.max_side, t.max_side)
    } else {
        img
    };
    let rgb = img.to_rgb8();
    PixelStats::from_rgb(rgb.pixels().map(|p| p.0), t)
        .map(|s| s.is_document_like(t))
        .unwrap_or(false)
}

#[cfg(not(feature = "visual"))]
pub fn looks_like_text_document(_bytes: &[u8], _t: &DocumentThresholds) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pixels: Vec<[u8; 3]>) -> PixelStats {
        PixelStats::from_rgb(pixels, &DocumentThresholds::default()).unwrap()
    }

    // Heuristic thresholds: these cases sit well inside each region, not on the boundaries.
    #[test]
    fn paper_with_ink_is_document_like() {
        let t = DocumentThresholds::default();
        let mut px = vec![[250, 250, 250]; 90];
        px.extend(vec![[10, 10, 10]; 10]);
        assert!(stats(px).is_document_like(&t));
    }

    #[test]
    fn blank_white_page_without_ink_is_not_flagged_by_paper_rule_alone() {
        let t = DocumentThresholds::default();
        let s = stats(vec![[250, 250, 250]; 100]);
        assert_eq!(s.dark, 0.0);
        // Still caught by the grayscale rule: pure white is gray.
        assert!(s.is_document_like(&t));
    }

    #[test]
    fn colorful_photo_is_not_document_like() {
        let t = DocumentThresholds::default();
        let mut px = vec![[200, 40, 30]; 50];
        px.extend(vec![[30, 160, 60]; 30]);
        px.extend(vec![[250, 250, 250]; 20]);
        assert!(!stats(px).is_document_like(&t));
    }

    #[test]
    fn empty_pixel_set_has_no_stats() {
        assert!(PixelStats::from_rgb(Vec::new(), &DocumentThresholds::default()).is_none());
    }

    #[test]
    fn undecodable_bytes_fail_open() {
        assert!(!looks_like_text_document(b"not an image", &DocumentThresholds::default()));
    }

    #[cfg(feature = "visual")]
    mod decode {
        use super::super::*;
        use image::{ImageFormat, Rgb, RgbImage};
        use std::io::Cursor;

        fn png(img: RgbImage) -> Vec<u8> {
            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Png).unwrap();
            out.into_inner()
        }

        #[test]
        fn scanned_page_is_flagged() {
            // 600x400 white page with dark text-like rows: forces downsampling.
            let img = RgbImage::from_fn(600, 400, |_, y| {
                if y % 20 < 2 {
                    Rgb([20, 20, 20])
                } else {
                    Rgb([245, 245, 245])
                }
            });
            assert!(looks_like_text_document(&png(img), &DocumentThresholds::default()));
        }

        #[test]
        fn colorful_image_is_not_flagged() {
            let img = RgbImage::from_fn(120, 90, |x, y| {
                Rgb([(x * 2) as u8, 200u8.saturating_sub((y * 2) as u8), 40])
            });
            assert!(!looks_like_text_document(&png(img), &DocumentThresholds::default()));
        }
    }
}
