//! ARASAAC pictogram search. Keyless; only the first word of the query is searched, plus any
//! curated aliases for it.

use crate::search::{as_text, endpoint_from_env, transport_error};
use crate::textprep::{deaccent, normalize};
use imgsync_core::{Candidate, Error, ImageSearchProvider, Provider, Result, SearchQuery};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.arasaac.org/v1/pictograms/es/search";
pub const DEFAULT_IMAGE_BASE: &str = "https://static.arasaac.org/pictograms";
const SOURCE_PAGE_BASE: &str = "https://arasaac.org/pictograms";
const LICENSE: &str = "CC BY-NC-SA 4.0";
const MAX_RESULTS: usize = 30;

const EXACT: f64 = 20.0;
const PREFIX: f64 = 12.0;
const SUBSTRING: f64 = 6.0;

#[derive(Debug, Clone)]
pub struct ArasaacProvider {
    client: reqwest::Client,
    search_endpoint: String,
    image_base: String,
    aliases: BTreeMap<String, Vec<String>>,
}

impl ArasaacProvider {
    pub fn new(client: reqwest::Client, aliases: BTreeMap<String, Vec<String>>) -> Self {
        Self::with_endpoint(
            client,
            endpoint_from_env("IMGSYNC_ARASAAC_ENDPOINT", DEFAULT_SEARCH_ENDPOINT),
            endpoint_from_env("IMGSYNC_ARASAAC_IMAGE_BASE", DEFAULT_IMAGE_BASE),
            aliases,
        )
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        search_endpoint: impl Into<String>,
        image_base: impl Into<String>,
        aliases: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            client,
            search_endpoint: search_endpoint.into().trim_end_matches('/').to_string(),
            image_base: image_base.into().trim_end_matches('/').to_string(),
            aliases,
        }
    }

    fn term_url(&self, term: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.search_endpoint)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.search_endpoint)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.search_endpoint.clone()))?
            .pop_if_empty()
            .push(&term.to_lowercase());
        Ok(url)
    }

    /// `None` for 404 (no pictograms for that term); anything that is not a JSON array is
    /// treated the same way.
    async fn fetch_term(&self, term: &str, q: &SearchQuery) -> Result<Option<Vec<serde_json::Value>>> {
        let url = self.term_url(term)?;
        let resp = self
            .client
            .get(url)
            .timeout(q.timeout())
            .send()
            .await
            .map_err(|e| transport_error(Provider::Arasaac, e))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                provider: Provider::Arasaac.as_str().to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| transport_error(Provider::Arasaac, e))?;
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(serde_json::Value::Array(items)) => Ok(Some(items)),
            _ => Ok(None),
        }
    }
}

/// First whitespace token of the query, deaccented and upper-cased (the alias table key).
pub fn search_token(query: &str) -> Option<String> {
    let first = query.split_whitespace().next()?;
    Some(deaccent(&first.to_lowercase()).to_uppercase())
}

fn pictogram_id(raw: &serde_json::Value) -> Option<String> {
    let id = as_text(raw.get("_id"));
    let id = if id.is_empty() { as_text(raw.get("id")) } else { id };
    (!id.is_empty() && id != "0").then_some(id)
}

fn keywords(raw: &serde_json::Value) -> Vec<String> {
    raw.get("keywords")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|k| as_text(k.get("keyword")))
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Exact keyword match beats keyword-starts-with-term, which beats substring.
pub fn keyword_relevance(keywords: &[String], targets: &[String]) -> f64 {
    let mut best: f64 = 0.0;
    for kw in keywords.iter().map(|k| normalize(k)) {
        let tier = if targets.iter().any(|t| *t == kw) {
            EXACT
        } else if targets.iter().any(|t| kw.starts_with(&format!("{t} "))) {
            PREFIX
        } else if targets.iter().any(|t| kw.contains(t.as_str())) {
            SUBSTRING
        } else {
            0.0
        };
        best = best.max(tier);
    }
    best
}

#[async_trait::async_trait]
impl ImageSearchProvider for ArasaacProvider {
    fn provider(&self) -> Provider {
        Provider::Arasaac
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let Some(token) = search_token(&q.query) else {
            return Ok(Vec::new());
        };
        let aliases = self.aliases.get(&token).cloned().unwrap_or_default();
        let mut terms = vec![token.clone()];
        for a in &aliases {
            if !terms.contains(a) {
                terms.push(a.clone());
            }
        }

        // Merge by pictogram id: a later duplicate replaces the payload but keeps its slot.
        let mut order: Vec<String> = Vec::new();
        let mut by_id: HashMap<String, serde_json::Value> = HashMap::new();
        for term in &terms {
            let Some(items) = self.fetch_term(term, q).await? else {
                continue;
            };
            for raw in items.into_iter().filter(|v| v.is_object()) {
                let Some(id) = pictogram_id(&raw) else {
                    continue;
                };
                if by_id.insert(id.clone(), raw).is_none() {
                    order.push(id);
                }
            }
        }

        let mut targets: Vec<String> = vec![normalize(&token)];
        for a in &aliases {
            let n = normalize(a);
            if !targets.contains(&n) {
                targets.push(n);
            }
        }

        let mut ranked: Vec<(f64, Candidate)> = Vec::with_capacity(order.len());
        for id in order {
            let Some(raw) = by_id.get(&id) else { continue };
            let kws = keywords(raw);
            let relevance = keyword_relevance(&kws, &targets);
            let mut c = Candidate::new(
                Provider::Arasaac,
                format!("{}/{id}/{id}_500.png", self.image_base),
            );
            c.source_page = format!("{SOURCE_PAGE_BASE}/{id}");
            c.title = kws.first().cloned().unwrap_or_else(|| token.clone());
            c.description = kws.join(" ");
            c.attribution = "ARASAAC".to_string();
            c.license = LICENSE.to_string();
            c.mime = Some("image/png".to_string());
            // Dimensions stay 0: pictograms bypass the size gate.
            ranked.push((relevance, c));
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(q.limit.clamp(1, MAX_RESULTS));
        Ok(ranked.into_iter().map(|(_, c)| c).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;

    fn kws(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn relevance_tiers() {
        let targets = vec!["mesa".to_string()];
        assert_eq!(keyword_relevance(&kws(&["mesa"]), &targets), EXACT);
        assert_eq!(keyword_relevance(&kws(&["mesa de comedor"]), &targets), PREFIX);
        assert_eq!(keyword_relevance(&kws(&["mesilla", "comesa"]), &targets), SUBSTRING);
        assert_eq!(keyword_relevance(&kws(&["silla"]), &targets), 0.0);
        assert_eq!(keyword_relevance(&kws(&["silla", "Mesa"]), &targets), EXACT);
    }

    #[test]
    fn token_is_first_word_deaccented() {
        assert_eq!(search_token("  Jabón baño FOTO").as_deref(), Some("JABON"));
        assert_eq!(search_token("   "), None);
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn merges_aliases_ranks_and_builds_static_urls() {
        let app = Router::new().route(
            "/search/:term",
            get(|Path(term): Path<String>| async move {
                match term.as_str() {
                    "docente" => (
                        StatusCode::OK,
                        Json(json!([
                            {"_id": 11, "keywords": [{"keyword": "docente universitario"}]},
                            {"_id": 12, "keywords": [{"keyword": "aula"}]}
                        ])),
                    ),
                    "profesor" => (
                        StatusCode::OK,
                        Json(json!([
                            {"_id": 13, "keywords": [{"keyword": "profesor"}]},
                            {"_id": 12, "keywords": [{"keyword": "aula de profesores"}]},
                            "not an object"
                        ])),
                    ),
                    _ => (StatusCode::NOT_FOUND, Json(json!({"error": "none"}))),
                }
            }),
        );
        let addr = serve(app).await;
        let mut aliases = BTreeMap::new();
        aliases.insert("DOCENTE".to_string(), kws(&["PROFESOR", "MAESTRO"]));
        let p = ArasaacProvider::with_endpoint(
            reqwest::Client::new(),
            format!("http://{addr}/search"),
            "https://static.example/pictograms",
            aliases,
        );

        let out = p
            .search(&SearchQuery::new("DOCENTE PROFESIONES FOTO REAL", 10))
            .await
            .unwrap();
        let ids: Vec<_> = out.iter().map(|c| c.source_page.as_str()).collect();
        // 13: exact alias (20); 11: prefix (12); 12: substring via replaced payload (6).
        assert_eq!(
            ids,
            [
                "https://arasaac.org/pictograms/13",
                "https://arasaac.org/pictograms/11",
                "https://arasaac.org/pictograms/12",
            ]
        );
        assert_eq!(out[0].image_url, "https://static.example/pictograms/13/13_500.png");
        assert_eq!(out[0].mime.as_deref(), Some("image/png"));
        assert_eq!(out[0].license, LICENSE);
        assert_eq!((out[0].width, out[0].height), (0, 0));
        assert_eq!(out[2].title, "aula de profesores");

        let capped = p
            .search(&SearchQuery::new("DOCENTE", 0))
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn not_found_is_empty_and_server_errors_propagate() {
        let app = Router::new()
            .route(
                "/ok/:term",
                get(|| async { (StatusCode::NOT_FOUND, "no") }),
            )
            .route(
                "/busy/:term",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            );
        let addr = serve(app).await;
        let empty = ArasaacProvider::with_endpoint(
            reqwest::Client::new(),
            format!("http://{addr}/ok"),
            DEFAULT_IMAGE_BASE,
            BTreeMap::new(),
        );
        assert!(empty.search(&SearchQuery::new("MESA", 5)).await.unwrap().is_empty());

        let busy = ArasaacProvider::with_endpoint(
            reqwest::Client::new(),
            format!("http://{addr}/busy"),
            DEFAULT_IMAGE_BASE,
            BTreeMap::new(),
        );
        let err = busy.search(&SearchQuery::new("MESA", 5)).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
