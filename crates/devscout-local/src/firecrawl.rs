use crate::{env_first, fetch_error_from_reqwest, FetchLimits};
use devscout_core::{
    parse_http_url, ContentFetcher, FetchError, FetchErrorKind, GatewayError, NormalizedContent,
    SearchProvider, SearchQuery, SearchResult, SearchResults, SetupError,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) fn firecrawl_api_key_from_env() -> Option<String> {
    env_first(&["DEVSCOUT_FIRECRAWL_API_KEY", "FIRECRAWL_API_KEY"])
}

/// Firecrawl: web search plus main-content scraping to markdown.
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    client: reqwest::Client,
    api_key: String,
    limits: FetchLimits,
}

impl FirecrawlClient {
    pub fn from_env(client: reqwest::Client, limits: FetchLimits) -> Result<Self, SetupError> {
        let api_key = firecrawl_api_key_from_env().ok_or_else(|| {
            SetupError::MissingCredential(
                "DEVSCOUT_FIRECRAWL_API_KEY (or FIRECRAWL_API_KEY)".to_string(),
            )
        })?;
        Ok(Self {
            client,
            api_key,
            limits,
        })
    }

    pub fn is_configured() -> bool {
        firecrawl_api_key_from_env().is_some()
    }

    fn endpoint_scrape() -> String {
        // For tests / enterprise proxies, allow overriding the endpoint.
        env_first(&["DEVSCOUT_FIRECRAWL_SCRAPE_ENDPOINT"])
            .unwrap_or_else(|| "https://api.firecrawl.dev/v2/scrape".to_string())
    }

    fn endpoint_search() -> String {
        env_first(&["DEVSCOUT_FIRECRAWL_SEARCH_ENDPOINT"])
            .unwrap_or_else(|| "https://api.firecrawl.dev/v2/search".to_string())
    }
}

#[async_trait::async_trait]
impl ContentFetcher for FirecrawlClient {
    fn name(&self) -> &'static str {
        "firecrawl"
    }

    async fn fetch(&self, url: &str) -> Result<NormalizedContent, FetchError> {
        parse_http_url(url)?;
        let t0 = Instant::now();

        let body = serde_json::json!({
            "url": url,
            "formats": ["markdown"],
            "onlyMainContent": true,
            "timeout": self.limits.timeout_ms,
        });
        let resp = self
            .client
            .post(Self::endpoint_scrape())
            .bearer_auth(&self.api_key)
            .json(&body)
            // Give Firecrawl's own timeout a little headroom.
            .timeout(Duration::from_millis(self.limits.timeout_ms + 5_000))
            .send()
            .await
            .map_err(|e| fetch_error_from_reqwest(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::from_http_status(status.as_u16()),
                url,
                format!("firecrawl scrape HTTP {status}"),
            ));
        }
        let parsed: FirecrawlScrapeResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::unreachable(url, e.to_string()))?;
        if !parsed.success {
            return Err(FetchError::unreachable(
                url,
                "firecrawl scrape returned success=false",
            ));
        }
        let markdown = parsed.data.and_then(|d| d.markdown).unwrap_or_default();
        debug!(
            url,
            chars = markdown.chars().count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "firecrawl scrape"
        );
        NormalizedContent::new(url, &markdown, self.limits.max_chars)
    }
}

#[async_trait::async_trait]
impl SearchProvider for FirecrawlClient {
    fn name(&self) -> &'static str {
        "firecrawl"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResults, GatewayError> {
        let t0 = Instant::now();
        let timeout_ms = q.timeout_ms.unwrap_or(self.limits.timeout_ms);
        let body = serde_json::json!({
            "query": q.query,
            "limit": q.limit,
            "timeout": timeout_ms,
        });
        let resp = self
            .client
            .post(Self::endpoint_search())
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_millis(timeout_ms + 5_000))
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Unavailable(format!(
                "firecrawl search HTTP {status}"
            )));
        }
        let parsed: FirecrawlSearchResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        if !parsed.success {
            return Err(GatewayError::Unavailable(
                "firecrawl search returned success=false".to_string(),
            ));
        }

        let results: Vec<SearchResult> = parsed
            .data
            .and_then(|d| d.web)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(SearchResult {
                    url: r.url?,
                    title: r.title.unwrap_or_default(),
                    excerpt: r.description.or(r.markdown).unwrap_or_default(),
                })
            })
            .collect();
        debug!(
            query = %q.query,
            results = results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "firecrawl search"
        );
        Ok(SearchResults::new("firecrawl", results, q.limit))
    }
}

#[derive(Debug, Deserialize)]
struct FirecrawlScrapeResponse {
    success: bool,
    data: Option<FirecrawlScrapeData>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlScrapeData {
    markdown: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlSearchResponse {
    #[serde(default = "default_true")]
    success: bool,
    data: Option<FirecrawlSearchData>,
}

fn default_true() -> bool {
    true
}

/// Results grouped by source; only `web` is read.
#[derive(Debug, Deserialize)]
struct FirecrawlSearchData {
    web: Option<Vec<FirecrawlSearchItem>>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlSearchItem {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    markdown: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;

    #[test]
    fn parses_minimal_firecrawl_scrape_shape() {
        let js = r##"{ "success": true, "data": { "markdown": "# Hi" } }"##;
        let parsed: FirecrawlScrapeResponse = serde_json::from_str(js).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.data.unwrap().markdown.unwrap(), "# Hi");
    }

    #[test]
    fn parses_grouped_search_shape() {
        let js = r#"{"data":{"web":[{"url":"https://a.dev","title":"A","description":"a"}],"news":[]}}"#;
        let parsed: FirecrawlSearchResponse = serde_json::from_str(js).unwrap();
        assert!(parsed.success);
        let web = parsed.data.unwrap().web.unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].description.as_deref(), Some("a"));
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    // Endpoints are read from the environment; keep every env-dependent step in one test.
    #[tokio::test]
    async fn firecrawl_search_and_scrape_against_fake_server() {
        let app = Router::new()
            .route(
                "/v2/search",
                post(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["limit"], 2);
                    Json(serde_json::json!({
                        "success": true,
                        "data": { "web": [
                            {"url": "https://supabase.com", "title": "Supabase", "description": "Postgres platform"},
                            {"title": "no url, dropped"},
                            {"url": "https://planetscale.com", "title": "PlanetScale"},
                            {"url": "https://neon.tech", "title": "Neon"}
                        ]}
                    }))
                }),
            )
            .route(
                "/v2/scrape",
                post(|Json(body): Json<serde_json::Value>| async move {
                    let url = body["url"].as_str().unwrap_or_default().to_string();
                    if url.contains("blocked") {
                        return (
                            axum::http::StatusCode::FORBIDDEN,
                            Json(serde_json::json!({"success": false})),
                        );
                    }
                    (
                        axum::http::StatusCode::OK,
                        Json(serde_json::json!({"success": true, "data": {"markdown": format!("# {url}")}})),
                    )
                }),
            );
        let addr = serve(app).await;

        std::env::set_var("DEVSCOUT_FIRECRAWL_API_KEY", "test-key");
        std::env::set_var(
            "DEVSCOUT_FIRECRAWL_SEARCH_ENDPOINT",
            format!("http://{addr}/v2/search"),
        );
        std::env::set_var(
            "DEVSCOUT_FIRECRAWL_SCRAPE_ENDPOINT",
            format!("http://{addr}/v2/scrape"),
        );

        let fc = FirecrawlClient::from_env(crate::http_client().unwrap(), FetchLimits::default())
            .unwrap();
        let got: Vec<SearchResult> = fc.search(&SearchQuery::new("db", 2)).await.unwrap().collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].title, "Supabase");
        assert_eq!(got[0].excerpt, "Postgres platform");
        assert_eq!(got[1].url, "https://planetscale.com");

        let ok = fc.fetch("https://supabase.com").await.unwrap();
        assert_eq!(ok.text, "# https://supabase.com");
        let err = fc.fetch("https://blocked.example").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Blocked);

        for k in [
            "DEVSCOUT_FIRECRAWL_API_KEY",
            "DEVSCOUT_FIRECRAWL_SEARCH_ENDPOINT",
            "DEVSCOUT_FIRECRAWL_SCRAPE_ENDPOINT",
        ] {
            std::env::remove_var(k);
        }
    }
}
