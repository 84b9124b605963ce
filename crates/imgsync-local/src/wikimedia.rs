//! Wikimedia Commons search via the MediaWiki `generator=search` API over the File namespace.
//!
//! Description, artist and license come out of `extmetadata` as HTML fragments and are
//! flattened with [`clean_text`]. Page categories are kept (minus the `Category:` prefix)
//! because the screener and scorer read them as object evidence.

use crate::assets::infer_mime_from_url;
use crate::search::{as_text, as_u32, endpoint_from_env, send_json};
use crate::textprep::clean_text;
use imgsync_core::{Candidate, ImageSearchProvider, Provider, Result, SearchQuery};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://commons.wikimedia.org/w/api.php";
const WIKI_PAGE_BASE: &str = "https://commons.wikimedia.org/wiki/";
const THUMB_WIDTH: &str = "1280";

#[derive(Debug, Clone)]
pub struct WikimediaProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl WikimediaProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(
            client,
            endpoint_from_env("IMGSYNC_WIKIMEDIA_ENDPOINT", DEFAULT_ENDPOINT),
        )
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: serde_json::Map<String, serde_json::Value>,
}

fn ext_value(info: &serde_json::Value, key: &str) -> String {
    let raw = info
        .get("extmetadata")
        .and_then(|m| m.get(key))
        .and_then(|m| m.get("value"));
    clean_text(&as_text(raw))
}

/// `File:Old market.jpg` -> `https://commons.wikimedia.org/wiki/File:Old_market.jpg`.
pub fn page_url(title: &str) -> String {
    let slug = title.trim().replace(' ', "_");
    match url::Url::parse(WIKI_PAGE_BASE) {
        Ok(mut u) => {
            if let Ok(mut segs) = u.path_segments_mut() {
                segs.pop_if_empty().push(&slug);
            }
            u.to_string()
        }
        Err(_) => format!("{WIKI_PAGE_BASE}{slug}"),
    }
}

fn category_titles(page: &serde_json::Value) -> Vec<String> {
    let Some(cats) = page.get("categories").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    cats.iter()
        .map(|c| {
            let title = clean_text(&as_text(c.get("title")));
            match title.split_once(':') {
                Some((prefix, rest)) if prefix.eq_ignore_ascii_case("category") => {
                    rest.trim().to_string()
                }
                _ => title,
            }
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn page_candidate(page: &serde_json::Value) -> Option<Candidate> {
    let info = page.get("imageinfo")?.as_array()?.first()?;
    let thumb = as_text(info.get("thumburl"));
    let image_url = if thumb.is_empty() {
        as_text(info.get("url"))
    } else {
        thumb
    };
    let mut c = Candidate::new(Provider::Wikimedia, image_url);
    let mime = as_text(info.get("mime"));
    c.mime = if mime.is_empty() {
        infer_mime_from_url(&c.image_url).map(str::to_string)
    } else {
        Some(mime)
    };
    let title = as_text(page.get("title"));
    c.source_page = page_url(&title);
    c.title = title;
    c.description = ext_value(info, "ImageDescription");
    c.categories = category_titles(page);
    c.attribution = ext_value(info, "Artist");
    c.license = ext_value(info, "LicenseShortName");
    // Thumbnail dimensions when a thumbnail was rendered, else the original's.
    c.width = match info.get("thumbwidth") {
        Some(v) => as_u32(Some(v)),
        None => as_u32(info.get("width")),
    };
    c.height = match info.get("thumbheight") {
        Some(v) => as_u32(Some(v)),
        None => as_u32(info.get("height")),
    };
    Some(c)
}

fn to_candidates(resp: ApiResponse) -> Vec<Candidate> {
    let Some(query) = resp.query else {
        return Vec::new();
    };
    // `pages` is keyed by page id; the search rank lives in each page's `index`.
    let mut pages: Vec<&serde_json::Value> = query.pages.values().collect();
    pages.sort_by_key(|p| p.get("index").and_then(|i| i.as_u64()).unwrap_or(u64::MAX));
    pages.into_iter().filter_map(page_candidate).collect()
}

#[async_trait::async_trait]
impl ImageSearchProvider for WikimediaProvider {
    fn provider(&self) -> Provider {
        Provider::Wikimedia
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let limit = q.limit.clamp(1, 25).to_string();
        let rb = self.client.get(&self.endpoint).query(&[
            ("action", "query"),
            ("format", "json"),
            ("generator", "search"),
            ("gsrsearch", q.query.as_str()),
            ("gsrnamespace", "6"),
            ("gsrlimit", limit.as_str()),
            ("prop", "imageinfo|categories"),
            ("iiprop", "url|mime|size|extmetadata"),
            ("iiurlwidth", THUMB_WIDTH),
            ("cllimit", "25"),
        ]);
        let resp: ApiResponse = send_json(Provider::Wikimedia, rb, q).await?;
        Ok(to_candidates(resp))
    }
}
