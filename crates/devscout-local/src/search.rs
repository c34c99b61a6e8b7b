use crate::env_first;
use devscout_core::{
    GatewayError, SearchProvider, SearchQuery, SearchResult, SearchResults, SetupError,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

pub(crate) fn brave_api_key_from_env() -> Option<String> {
    env_first(&["DEVSCOUT_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

pub(crate) fn tavily_api_key_from_env() -> Option<String> {
    env_first(&["DEVSCOUT_TAVILY_API_KEY", "TAVILY_API_KEY"])
}

pub fn searxng_endpoints_from_env() -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    // Comma/whitespace-separated list for simple load spreading.
    if let Ok(v) = std::env::var("DEVSCOUT_SEARXNG_ENDPOINTS") {
        for raw in v.split(|c: char| c == ',' || c.is_whitespace()) {
            let s = raw.trim();
            if !s.is_empty() && !out.iter().any(|e| e == s) {
                out.push(s.to_string());
            }
        }
    }
    if let Some(s) = env_first(&["DEVSCOUT_SEARXNG_ENDPOINT"]) {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

fn unavailable(provider: &str, e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Unavailable(format!("{provider}: {e}"))
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BraveSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self, SetupError> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            SetupError::MissingCredential(
                "DEVSCOUT_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self { client, api_key })
    }

    pub fn is_configured() -> bool {
        brave_api_key_from_env().is_some()
    }

    fn endpoint() -> String {
        env_first(&["DEVSCOUT_BRAVE_ENDPOINT"])
            .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResults, GatewayError> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(Self::endpoint())
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())])
            .query(&[("count", q.limit.to_string())])
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| unavailable("brave", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable("brave", format!("HTTP {status}")));
        }
        let parsed: BraveWebSearchResponse =
            resp.json().await.map_err(|e| unavailable("brave", e))?;

        let results: Vec<SearchResult> = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title.unwrap_or_default(),
                excerpt: r.description.unwrap_or_default(),
            })
            .collect();
        debug!(
            query = %q.query,
            results = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "brave search"
        );
        Ok(SearchResults::new("brave", results, q.limit))
    }
}

#[derive(Debug, Clone)]
pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self, SetupError> {
        let api_key = tavily_api_key_from_env().ok_or_else(|| {
            SetupError::MissingCredential("DEVSCOUT_TAVILY_API_KEY (or TAVILY_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    pub fn is_configured() -> bool {
        tavily_api_key_from_env().is_some()
    }

    fn endpoint() -> String {
        env_first(&["DEVSCOUT_TAVILY_ENDPOINT"])
            .unwrap_or_else(|| "https://api.tavily.com/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResults, GatewayError> {
        let t0 = Instant::now();
        let body = serde_json::json!({
            "query": q.query,
            "max_results": q.limit,
            "include_answer": false,
            "include_raw_content": false,
            "search_depth": "basic",
        });
        let resp = self
            .client
            .post(Self::endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| unavailable("tavily", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable("tavily", format!("HTTP {status}")));
        }
        let parsed: TavilySearchResponse =
            resp.json().await.map_err(|e| unavailable("tavily", e))?;

        let results: Vec<SearchResult> = parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title.unwrap_or_default(),
                excerpt: r.content.unwrap_or_default(),
            })
            .collect();
        debug!(
            query = %q.query,
            results = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "tavily search"
        );
        Ok(SearchResults::new("tavily", results, q.limit))
    }
}

#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl SearxngSearchProvider {
    pub fn new(client: reqwest::Client, endpoints: Vec<String>) -> Result<Self, SetupError> {
        if endpoints.is_empty() {
            return Err(SetupError::MissingCredential(
                "DEVSCOUT_SEARXNG_ENDPOINT (or DEVSCOUT_SEARXNG_ENDPOINTS)".to_string(),
            ));
        }
        Ok(Self { client, endpoints })
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self, SetupError> {
        Self::new(client, searxng_endpoints_from_env())
    }

    pub fn is_configured() -> bool {
        !searxng_endpoints_from_env().is_empty()
    }

    fn endpoint_search_for(base_endpoint: &str) -> String {
        // Accept either a base URL (…/), or a full /search endpoint.
        let mut base = base_endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }

    fn stable_hash64(query: &str) -> u64 {
        // FNV-1a: stable across runs, unlike HashMap's RandomState.
        let mut h: u64 = 1469598103934665603;
        for b in query.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        h
    }

    fn pick_endpoint_index(&self, q: &SearchQuery) -> usize {
        (Self::stable_hash64(&q.query) as usize) % self.endpoints.len()
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResults, GatewayError> {
        let t0 = Instant::now();
        let base = &self.endpoints[self.pick_endpoint_index(q)];
        let resp = self
            .client
            .get(Self::endpoint_search_for(base))
            .query(&[("q", q.query.as_str()), ("format", "json")])
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| unavailable("searxng", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable("searxng", format!("HTTP {status}")));
        }
        let parsed: SearxngSearchResponse =
            resp.json().await.map_err(|e| unavailable("searxng", e))?;

        let results: Vec<SearchResult> = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(SearchResult {
                    url: r.url?,
                    title: r.title.unwrap_or_default(),
                    excerpt: r.content.unwrap_or_default(),
                })
            })
            .collect();
        debug!(
            query = %q.query,
            results = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "searxng search"
        );
        Ok(SearchResults::new("searxng", results, q.limit))
    }
}
