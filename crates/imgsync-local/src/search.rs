//! Shared plumbing for the image-search adapters plus the factory that turns an ordered
//! provider list into live adapters.

use crate::arasaac::ArasaacProvider;
use crate::google_cse::GoogleCseProvider;
use crate::knowledge::KnowledgeBase;
use crate::openverse::OpenverseProvider;
use crate::pexels::PexelsProvider;
use crate::wikimedia::WikimediaProvider;
use imgsync_core::{Credentials, Error, ImageSearchProvider, Provider, Result, SearchQuery};
use serde::de::DeserializeOwned;

pub(crate) fn endpoint_from_env(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn transport_error(provider: Provider, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Search(format!("{provider} request timed out: {e}"))
    } else {
        Error::Search(format!("{provider}: {e}"))
    }
}

/// Send, require 2xx, decode JSON. Non-2xx surfaces as `HttpStatus` (so 429 is visible to the
/// aggregator); an undecodable body surfaces as `Malformed`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    rb: reqwest::RequestBuilder,
    q: &SearchQuery,
) -> Result<T> {
    let resp = rb
        .timeout(q.timeout())
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            provider: provider.as_str().to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await.map_err(|e| transport_error(provider, e))?;
    serde_json::from_slice(&body).map_err(|e| Error::Malformed {
        provider: provider.as_str().to_string(),
        message: e.to_string(),
    })
}

/// Lenient integer read: providers send numbers, numeric strings, or null.
pub(crate) fn as_u32(v: Option<&serde_json::Value>) -> u32 {
    match v {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Lenient string read: strings are trimmed, numbers stringified, anything else is empty.
pub(crate) fn as_text(v: Option<&serde_json::Value>) -> String {
    match v {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub struct ProviderSet {
    pub providers: Vec<Box<dyn ImageSearchProvider>>,
    /// Providers left out (missing credentials); reported once, never attempted.
    pub skipped: Vec<(Provider, String)>,
}

impl ProviderSet {
    pub fn active(&self) -> Vec<Provider> {
        self.providers.iter().map(|p| p.provider()).collect()
    }
}

/// Instantiate adapters in `order` (duplicates dropped). Providers whose credentials are
/// missing end up in `skipped` with the reason.
pub fn build_providers(
    client: &reqwest::Client,
    order: &[Provider],
    creds: &Credentials,
    kb: &KnowledgeBase,
) -> ProviderSet {
    let mut providers: Vec<Box<dyn ImageSearchProvider>> = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = Vec::new();
    for &p in order {
        if seen.contains(&p) {
            continue;
        }
        seen.push(p);
        match p {
            Provider::Arasaac => providers.push(Box::new(ArasaacProvider::new(
                client.clone(),
                kb.arasaac_aliases.clone(),
            ))),
            Provider::Pexels => match creds.pexels_api_key.clone() {
                Some(key) => providers.push(Box::new(PexelsProvider::new(client.clone(), key))),
                None => skipped.push((p, "missing PEXELS_API_KEY".to_string())),
            },
            Provider::GoogleCse => match (creds.google_api_key.clone(), creds.google_cx.clone()) {
                (Some(key), Some(cx)) => {
                    providers.push(Box::new(GoogleCseProvider::new(client.clone(), key, cx)))
                }
                _ => skipped.push((p, "missing GOOGLE_CSE_API_KEY/GOOGLE_CSE_CX".to_string())),
            },
            Provider::Openverse => {
                providers.push(Box::new(OpenverseProvider::new(client.clone())))
            }
            Provider::Wikimedia => {
                providers.push(Box::new(WikimediaProvider::new(client.clone())))
            }
        }
    }
    ProviderSet { providers, skipped }
}
