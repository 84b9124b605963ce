use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("{provider} HTTP {status}")]
    HttpStatus { provider: String, status: u16 },
    #[error("malformed {provider} response: {message}")]
    Malformed { provider: String, message: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("provenance store error: {0}")]
    Store(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for HTTP 429 responses (the caller is expected to back off).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 429, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The image-search backends imgsync knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Arasaac,
    Pexels,
    GoogleCse,
    Openverse,
    Wikimedia,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Arasaac,
        Provider::Pexels,
        Provider::GoogleCse,
        Provider::Openverse,
        Provider::Wikimedia,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Arasaac => "arasaac",
            Provider::Pexels => "pexels",
            Provider::GoogleCse => "google_cse",
            Provider::Openverse => "openverse",
            Provider::Wikimedia => "wikimedia",
        }
    }

    /// Pictogram providers serve small vector-like artwork: no size gating, no document check.
    pub fn is_pictogram(self) -> bool {
        matches!(self, Provider::Arasaac)
    }

    pub fn requires_credentials(self) -> bool {
        matches!(self, Provider::Pexels | Provider::GoogleCse)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lc = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == lc)
            .ok_or_else(|| Error::NotConfigured(format!("unknown provider: {s}")))
    }
}

/// One image returned by one provider for one query.
///
/// Candidates are value objects: the image URL is their only identity and they are never
/// persisted directly (see [`ProvenanceRecord`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider: Provider,
    pub image_url: String,
    pub source_page: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub attribution: String,
    pub license: String,
    /// MIME type as reported by the provider (may be absent; see `effective_mime` in the
    /// validity gate).
    pub mime: Option<String>,
    /// 0 means unknown/unreported.
    pub width: u32,
    pub height: u32,
    /// Query variant that first produced this candidate.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub score: f64,
}

impl Candidate {
    /// Empty candidate for `provider`; adapters fill in what the response carries.
    pub fn new(provider: Provider, image_url: impl Into<String>) -> Self {
        Self {
            provider,
            image_url: image_url.into(),
            source_page: String::new(),
            title: String::new(),
            description: String::new(),
            categories: Vec::new(),
            attribution: String::new(),
            license: String::new(),
            mime: None,
            width: 0,
            height: 0,
            query: String::new(),
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Per-provider result cap (each adapter clamps further to what its API allows).
    pub limit: usize,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        // Provider requests can hang indefinitely without an explicit timeout.
        Duration::from_millis(self.timeout_ms.unwrap_or(20_000).clamp(1_000, 120_000))
    }
}

/// API credentials for the providers that need them. Blank values count as missing.
#[derive(Clone, Default)]
pub struct Credentials {
    pub pexels_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
}

impl Credentials {
    pub fn new(
        pexels_api_key: Option<String>,
        google_api_key: Option<String>,
        google_cx: Option<String>,
    ) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            pexels_api_key: keep(pexels_api_key),
            google_api_key: keep(google_api_key),
            google_cx: keep(google_cx),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("PEXELS_API_KEY").ok(),
            std::env::var("GOOGLE_CSE_API_KEY").ok(),
            std::env::var("GOOGLE_CSE_CX").ok(),
        )
    }

    pub fn has_for(&self, provider: Provider) -> bool {
        match provider {
            Provider::Pexels => self.pexels_api_key.is_some(),
            Provider::GoogleCse => self.google_api_key.is_some() && self.google_cx.is_some(),
            _ => true,
        }
    }

    /// Presence fingerprint (never the values), used in search cache keys.
    pub fn presence(&self) -> String {
        format!(
            "{}{}{}",
            u8::from(self.pexels_api_key.is_some()),
            u8::from(self.google_api_key.is_some()),
            u8::from(self.google_cx.is_some())
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("pexels_api_key", &self.pexels_api_key.as_ref().map(|_| "<set>"))
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<set>"))
            .field("google_cx", &self.google_cx.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Read-only view of one dataset item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    pub word: Option<String>,
    #[serde(default)]
    pub words: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub level: i64,
    pub image_asset: Option<String>,
}

impl DatasetEntry {
    /// First non-empty of `word`, `words[0]`, then the id.
    pub fn main_word(&self) -> String {
        if let Some(w) = self.word.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            return w.to_string();
        }
        if let Some(w) = self.words.first().map(|w| w.trim()).filter(|w| !w.is_empty()) {
            return w.to_string();
        }
        self.id.trim().to_string()
    }
}

/// Where a stored asset came from. Keyed by `item_id`; re-resolution overwrites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvenanceRecord {
    pub item_id: String,
    pub query: String,
    pub provider: String,
    pub image_url: String,
    pub source_page: String,
    pub title: String,
    pub license: String,
    pub attribution: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub downloaded_at: String,
    pub stored_as: String,
}

impl ProvenanceRecord {
    pub fn from_candidate(
        item_id: &str,
        candidate: &Candidate,
        mime: &str,
        downloaded_at: String,
        stored_as: String,
    ) -> Self {
        Self {
            item_id: item_id.to_string(),
            query: candidate.query.clone(),
            provider: candidate.provider.as_str().to_string(),
            image_url: candidate.image_url.clone(),
            source_page: candidate.source_page.clone(),
            title: candidate.title.clone(),
            license: candidate.license.clone(),
            attribution: candidate.attribution.clone(),
            mime: mime.to_string(),
            width: candidate.width,
            height: candidate.height,
            downloaded_at,
            stored_as,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Set when the body exceeded `max_bytes` (bytes holds the first `max_bytes`).
    pub truncated: bool,
}

#[async_trait::async_trait]
pub trait ImageSearchProvider: Send + Sync {
    fn provider(&self) -> Provider;
    /// Transport and HTTP errors are returned, never swallowed.
    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>>;
}

#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchedImage>;
}
