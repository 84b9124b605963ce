use crate::assets::infer_mime_from_url;
use crate::search::{as_text, as_u32, endpoint_from_env, send_json};
use imgsync_core::{Candidate, ImageSearchProvider, Provider, Result, SearchQuery};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.pexels.com/v1/search";
const LICENSE: &str = "PEXELS LICENSE";

#[derive(Debug, Clone)]
pub struct PexelsProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl PexelsProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self::with_endpoint(
            client,
            api_key,
            endpoint_from_env("IMGSYNC_PEXELS_ENDPOINT", DEFAULT_ENDPOINT),
        )
    }

    pub fn with_endpoint(client: reqwest::Client, api_key: String, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<serde_json::Value>,
}

/// Largest rendition first; empty strings fall through.
fn best_src(photo: &serde_json::Value) -> Option<String> {
    let src = photo.get("src")?;
    ["large2x", "large", "original", "medium"]
        .iter()
        .map(|k| as_text(src.get(*k)))
        .find(|u| !u.is_empty())
}

fn to_candidates(resp: PexelsResponse) -> Vec<Candidate> {
    let mut out = Vec::new();
    for photo in resp.photos {
        let Some(image_url) = best_src(&photo) else {
            continue;
        };
        let alt = as_text(photo.get("alt"));
        let mut c = Candidate::new(Provider::Pexels, image_url);
        c.mime = infer_mime_from_url(&c.image_url).map(str::to_string);
        c.source_page = as_text(photo.get("url"));
        c.title = if alt.is_empty() {
            format!("PEXELS PHOTO {}", as_text(photo.get("id")))
        } else {
            alt.clone()
        };
        c.description = alt;
        c.attribution = as_text(photo.get("photographer"));
        c.license = LICENSE.to_string();
        c.width = as_u32(photo.get("width"));
        c.height = as_u32(photo.get("height"));
        out.push(c);
    }
    out
}

#[async_trait::async_trait]
impl ImageSearchProvider for PexelsProvider {
    fn provider(&self) -> Provider {
        Provider::Pexels
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let per_page = q.limit.clamp(1, 80).to_string();
        let rb = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", q.query.as_str()),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
                ("size", "large"),
            ]);
        let resp: PexelsResponse = send_json(Provider::Pexels, rb, q).await?;
        Ok(to_candidates(resp))
    }
}
