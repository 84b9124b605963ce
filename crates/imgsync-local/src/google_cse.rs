//! Google Custom Search (image mode). Licensing is enforced server-side through the `rights`
//! filter, so candidates carry a fixed marker license instead of a real one.

use crate::assets::infer_mime_from_url;
use crate::search::{as_text, as_u32, endpoint_from_env, send_json};
use imgsync_core::{Candidate, ImageSearchProvider, Provider, Result, SearchQuery};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
pub const RIGHTS_FILTER_LICENSE: &str = "GOOGLE RIGHTS FILTER";
const RIGHTS: &str = "cc_publicdomain|cc_attribute|cc_sharealike";

#[derive(Debug, Clone)]
pub struct GoogleCseProvider {
    client: reqwest::Client,
    api_key: String,
    cx: String,
    endpoint: String,
}

impl GoogleCseProvider {
    pub fn new(client: reqwest::Client, api_key: String, cx: String) -> Self {
        Self::with_endpoint(
            client,
            api_key,
            cx,
            endpoint_from_env("IMGSYNC_GOOGLE_CSE_ENDPOINT", DEFAULT_ENDPOINT),
        )
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        api_key: String,
        cx: String,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            cx,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

fn to_candidates(resp: CseResponse) -> Vec<Candidate> {
    let mut out = Vec::new();
    for item in resp.items {
        let link = as_text(item.get("link"));
        if link.is_empty() {
            continue;
        }
        let image = item.get("image");
        let mut c = Candidate::new(Provider::GoogleCse, link);
        let mime = as_text(item.get("mime"));
        c.mime = if mime.is_empty() {
            infer_mime_from_url(&c.image_url).map(str::to_string)
        } else {
            Some(mime)
        };
        c.source_page = as_text(image.and_then(|i| i.get("contextLink")));
        c.title = as_text(item.get("title"));
        c.attribution = as_text(item.get("displayLink"));
        c.license = RIGHTS_FILTER_LICENSE.to_string();
        c.width = as_u32(image.and_then(|i| i.get("width")));
        c.height = as_u32(image.and_then(|i| i.get("height")));
        out.push(c);
    }
    out
}

#[async_trait::async_trait]
impl ImageSearchProvider for GoogleCseProvider {
    fn provider(&self) -> Provider {
        Provider::GoogleCse
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let num = q.limit.clamp(1, 10).to_string();
        let rb = self.client.get(&self.endpoint).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
            ("q", q.query.as_str()),
            ("searchType", "image"),
            ("safe", "active"),
            ("num", num.as_str()),
            ("hl", "es"),
            ("gl", "es"),
            ("rights", RIGHTS),
        ]);
        let resp: CseResponse = send_json(Provider::GoogleCse, rb, q).await?;
        Ok(to_candidates(resp))
    }
}
