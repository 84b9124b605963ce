use crate::assets::infer_mime_from_url;
use crate::search::{as_text, as_u32, endpoint_from_env, send_json};
use imgsync_core::{Candidate, ImageSearchProvider, Provider, Result, SearchQuery};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://api.openverse.org/v1/images/";

#[derive(Debug, Clone)]
pub struct OpenverseProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenverseProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(
            client,
            endpoint_from_env("IMGSYNC_OPENVERSE_ENDPOINT", DEFAULT_ENDPOINT),
        )
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenverseResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

/// "BY-SA" + "4.0" -> "BY-SA 4.0".
fn license_name(item: &serde_json::Value) -> String {
    let code = as_text(item.get("license")).to_uppercase();
    let version = as_text(item.get("license_version"));
    [code, version]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tags arrive as `[{name}]`, bare strings, or a single string.
fn tags_text(item: &serde_json::Value) -> String {
    match item.get("tags") {
        Some(serde_json::Value::Array(tags)) => tags
            .iter()
            .map(|t| match t {
                serde_json::Value::Object(_) => as_text(t.get("name")),
                other => as_text(Some(other)),
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn mime_for(item: &serde_json::Value, url: &str) -> Option<String> {
    let reported = as_text(item.get("mimetype"));
    if !reported.is_empty() {
        return Some(reported);
    }
    let from_filetype = match as_text(item.get("filetype")).to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    };
    from_filetype
        .or_else(|| infer_mime_from_url(url))
        .map(str::to_string)
}

fn to_candidates(resp: OpenverseResponse) -> Vec<Candidate> {
    let mut out = Vec::new();
    for item in resp.results {
        let url = as_text(item.get("url"));
        if url.is_empty() {
            continue;
        }
        let mut c = Candidate::new(Provider::Openverse, url);
        c.mime = mime_for(&item, &c.image_url);
        c.source_page = as_text(item.get("foreign_landing_url"));
        c.title = as_text(item.get("title"));
        c.description = tags_text(&item);
        c.attribution = as_text(item.get("creator"));
        c.license = license_name(&item);
        c.width = as_u32(item.get("width"));
        c.height = as_u32(item.get("height"));
        out.push(c);
    }
    out
}

#[async_trait::async_trait]
impl ImageSearchProvider for OpenverseProvider {
    fn provider(&self) -> Provider {
        Provider::Openverse
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let page_size = q.limit.clamp(1, 20).to_string();
        let rb = self.client.get(&self.endpoint).query(&[
            ("q", q.query.as_str()),
            ("page_size", page_size.as_str()),
            ("mature", "false"),
            // Commercial-use filter keeps unclear licenses out upstream.
            ("license_type", "commercial"),
        ]);
        let resp: OpenverseResponse = send_json(Provider::Openverse, rb, q).await?;
        Ok(to_candidates(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use serde_json::json;

    #[test]
    fn license_and_tags_are_flattened() {
        let resp: OpenverseResponse = serde_json::from_value(json!({
            "results": [
                {
                    "url": "https://live.example/photo",
                    "filetype": "jpg",
                    "license": "by-sa",
                    "license_version": "2.0",
                    "title": "Kitchen table",
                    "creator": "someone",
                    "foreign_landing_url": "https://flickr.example/1",
                    "tags": [{"name": "table"}, {"name": ""}, "wood"],
                    "width": 2048,
                    "height": 1536
                },
                {"url": ""},
                {"url": "https://live.example/b.png", "license": "cc0", "tags": "kitchen furniture"}
            ]
        }))
        .unwrap();
        let out = to_candidates(resp);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].license, "BY-SA 2.0");
        assert_eq!(out[0].description, "table wood");
        assert_eq!(out[0].mime.as_deref(), Some("image/jpeg"));
        assert_eq!(out[0].source_page, "https://flickr.example/1");
        assert_eq!(out[1].license, "CC0");
        assert_eq!(out[1].description, "kitchen furniture");
        assert_eq!(out[1].mime.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let app = Router::new().route(
            "/v1/images/",
            get(|| async { (StatusCode::OK, "<html>maintenance</html>") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let p = OpenverseProvider::with_endpoint(
            reqwest::Client::new(),
            format!("http://{addr}/v1/images/"),
        );
        let err = p.search(&SearchQuery::new("mesa", 5)).await.unwrap_err();
        assert!(matches!(err, imgsync_core::Error::Malformed { .. }));
    }
}
