use devscout_core::{
    parse_http_url, ContentFetcher, FetchError, FetchErrorKind, NormalizedContent, SetupError,
};
use std::time::{Duration, Instant};
use tracing::debug;

pub mod coerce;
pub mod extract;
pub mod firecrawl;
pub mod openai_compat;
pub mod search;

/// First non-empty value among `keys`, trimmed.
pub(crate) fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        std::env::var(k)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Shared HTTP client for every provider.
pub fn http_client() -> Result<reqwest::Client, SetupError> {
    reqwest::Client::builder()
        .user_agent(concat!("devscout/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        // Upper bound for stalled DNS/TLS/body reads; per-request timeouts are tighter.
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| SetupError::Client(e.to_string()))
}

/// Bounds applied to every content fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout_ms: u64,
    /// Hard cap on bytes read from a response body.
    pub max_bytes: usize,
    /// Cap on normalized text length, in chars.
    pub max_chars: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            max_bytes: 5_000_000,
            max_chars: 8_000,
        }
    }
}

pub(crate) fn fetch_error_from_reqwest(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::timeout(url, e.to_string())
    } else {
        FetchError::unreachable(url, e.to_string())
    }
}

/// Plain HTTP fetch with local HTML-to-text extraction. Needs no credentials.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
    limits: FetchLimits,
}

impl LocalFetcher {
    pub fn new(client: reqwest::Client, limits: FetchLimits) -> Self {
        Self { client, limits }
    }
}

#[async_trait::async_trait]
impl ContentFetcher for LocalFetcher {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, url: &str) -> Result<NormalizedContent, FetchError> {
        let parsed = parse_http_url(url)?;
        let t0 = Instant::now();

        let resp = self
            .client
            .get(parsed)
            .timeout(Duration::from_millis(self.limits.timeout_ms))
            .send()
            .await
            .map_err(|e| fetch_error_from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::from_http_status(status.as_u16()),
                url,
                format!("HTTP {status}"),
            ));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = self.limits.max_bytes;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| fetch_error_from_reqwest(url, e))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        let n_bytes = bytes.len();
        let text = tokio::task::spawn_blocking(move || {
            extract::text_from_bytes(&bytes, content_type.as_deref())
        })
        .await
        .map_err(|e| FetchError::unreachable(url, format!("extract join failed: {e}")))?;

        debug!(
            url,
            status = status.as_u16(),
            bytes = n_bytes,
            text_chars = text.chars().count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "local fetch"
        );
        NormalizedContent::new(url, &text, self.limits.max_chars)
    }
}
