//! Fan a query out over the configured providers, in order, and merge what comes back.
//!
//! Provider failures never abort an entry: they are logged and the next provider is tried.
//! A 429 additionally costs a fixed backoff before moving on.

use imgsync_core::{Candidate, ImageSearchProvider, Provider, SearchQuery};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(2_500);

pub struct Aggregator {
    providers: Vec<Box<dyn ImageSearchProvider>>,
    per_provider_limit: usize,
    timeout_ms: Option<u64>,
    rate_limit_backoff: Duration,
    /// Everything besides the query text that changes a search result.
    signature: String,
    cache: HashMap<String, Vec<Candidate>>,
}

impl Aggregator {
    /// `credential_presence` is folded into cache keys (see [`imgsync_core::Credentials::presence`]).
    pub fn new(
        providers: Vec<Box<dyn ImageSearchProvider>>,
        per_provider_limit: usize,
        credential_presence: &str,
    ) -> Self {
        let names: Vec<&str> = providers.iter().map(|p| p.provider().as_str()).collect();
        let signature = format!(
            "{}|{}|{}",
            names.join(","),
            per_provider_limit,
            credential_presence
        );
        Self {
            providers,
            per_provider_limit,
            timeout_ms: None,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            signature,
            cache: HashMap::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = backoff;
        self
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.providers.iter().map(|p| p.provider()).collect()
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// One query across every provider, in listed order. Never fails.
    pub async fn fetch_all(&self, query: &str) -> Vec<Candidate> {
        let mut q = SearchQuery::new(query, self.per_provider_limit);
        q.timeout_ms = self.timeout_ms;
        let mut out = Vec::new();
        for p in &self.providers {
            let provider = p.provider();
            match p.search(&q).await {
                Ok(mut found) => {
                    debug!(provider = %provider, query, results = found.len(), "provider search");
                    out.append(&mut found);
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        warn!(
                            provider = %provider,
                            backoff_ms = self.rate_limit_backoff.as_millis() as u64,
                            "rate limited; backing off"
                        );
                        tokio::time::sleep(self.rate_limit_backoff).await;
                    }
                    warn!(provider = %provider, query, error = %e, "provider search failed");
                }
            }
        }
        out
    }

    /// [`Aggregator::fetch_all`] memoized per (query, provider set, limit, credential presence).
    pub async fn fetch_cached(&mut self, query: &str) -> Vec<Candidate> {
        let key = format!("{query}|{}", self.signature);
        if let Some(hit) = self.cache.get(&key) {
            debug!(query, "search cache hit");
            return hit.clone();
        }
        let found = self.fetch_all(query).await;
        self.cache.insert(key, found.clone());
        found
    }

    /// All query variants for one entry, deduplicated by image URL. The first occurrence wins
    /// and keeps the variant that produced it in `Candidate::query`.
    pub async fn collect(&mut self, queries: &[String]) -> Vec<Candidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for query in queries {
            for mut c in self.fetch_cached(query).await {
                let url = c.image_url.trim().to_string();
                if url.is_empty() || !seen.insert(url) {
                    continue;
                }
                c.query = query.clone();
                out.push(c);
            }
        }
        out
    }
}
