use serde::{Deserialize, Serialize};
use std::fmt;

pub mod record;
pub mod schema;

pub use record::{PricingModel, Recommendation, ToolFacts, ToolNames, ToolRecord};
pub use schema::{FieldKind, FieldSpec, SchemaDescriptor, SchemaInstance};

/// Hard cap on results per search call, whatever the caller asks for.
pub const MAX_SEARCH_RESULTS: usize = 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("search unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Unreachable,
    Blocked,
    Empty,
    Timeout,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Unreachable => "unreachable",
            FetchErrorKind::Blocked => "blocked",
            FetchErrorKind::Empty => "empty",
            FetchErrorKind::Timeout => "timeout",
        }
    }

    /// Status codes that mean "the site refused us" rather than "the site is down".
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 | 407 | 429 | 451 => FetchErrorKind::Blocked,
            _ => FetchErrorKind::Unreachable,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch {kind} for {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unreachable, url, message)
    }

    pub fn timeout(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, url, message)
    }

    pub fn empty(url: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Empty, url, "no readable text")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("schema_mismatch ({schema}): {detail}")]
    SchemaMismatch {
        schema: &'static str,
        detail: String,
        raw: String,
    },
    #[error("upstream_unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl CoercionError {
    pub fn reason(&self) -> &'static str {
        match self {
            CoercionError::SchemaMismatch { .. } => "schema_mismatch",
            CoercionError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model request timed out: {0}")]
    Timeout(String),
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model HTTP {status}")]
    Http { status: u16 },
    #[error("model returned no content")]
    EmptyResponse,
}

impl From<ModelError> for CoercionError {
    fn from(e: ModelError) -> Self {
        CoercionError::UpstreamUnavailable(e.to_string())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("invalid option {name}: {message}")]
    InvalidOption { name: &'static str, message: String },
    #[error("http client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Always within `1..=MAX_SEARCH_RESULTS`.
    pub limit: usize,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit: limit.clamp(1, MAX_SEARCH_RESULTS),
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// Ranked results of one search call.
///
/// Iteration consumes the results; there is no way to rewind. Order is the
/// provider's relevance order and is capped at the query's `limit`.
#[derive(Debug)]
pub struct SearchResults {
    provider: &'static str,
    inner: std::iter::Take<std::vec::IntoIter<SearchResult>>,
}

impl SearchResults {
    pub fn new(provider: &'static str, results: Vec<SearchResult>, limit: usize) -> Self {
        Self {
            provider,
            inner: results.into_iter().take(limit),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }
}

impl Iterator for SearchResults {
    type Item = SearchResult;

    fn next(&mut self) -> Option<SearchResult> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Empty results are `Ok`; only transport-level failures are errors.
    async fn search(&self, q: &SearchQuery) -> std::result::Result<SearchResults, GatewayError>;
}

/// Readable text extracted from one URL, bounded in length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedContent {
    pub url: String,
    pub text: String,
    pub truncated: bool,
}

impl NormalizedContent {
    /// Text past `max_chars` is dropped.
    /// Text with no readable characters is an `Empty` fetch error.
    pub fn new(url: &str, text: &str, max_chars: usize) -> std::result::Result<Self, FetchError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(FetchError::empty(url));
        }
        let (text, truncated) = truncate_chars(trimmed, max_chars);
        if text.is_empty() {
            return Err(FetchError::empty(url));
        }
        Ok(Self {
            url: url.to_string(),
            text,
            truncated,
        })
    }
}

#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, url: &str) -> std::result::Result<NormalizedContent, FetchError>;

    /// One result per input URL, in input order. Items fail independently.
    async fn fetch_batch(
        &self,
        urls: &[String],
    ) -> Vec<std::result::Result<NormalizedContent, FetchError>> {
        futures_util::future::join_all(urls.iter().map(|u| self.fetch(u))).await
    }
}

/// Parse a URL and require an http(s) scheme.
pub fn parse_http_url(raw: &str) -> std::result::Result<url::Url, FetchError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| FetchError::unreachable(raw, format!("invalid url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::unreachable(
            raw,
            format!("unsupported scheme: {other}"),
        )),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: Option<u64>,
    /// Ask the backend for a JSON object response when it supports it.
    pub json_mode: bool,
    pub timeout_ms: u64,
}

#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, req: &CompletionRequest) -> std::result::Result<String, ModelError>;
}

/// Turns free-form context into a value that satisfies a schema.
///
/// Implementations must not retry; a failure is reported once and the caller decides.
#[async_trait::async_trait]
pub trait Coercer: Send + Sync {
    async fn coerce(
        &self,
        context: &str,
        schema: &SchemaDescriptor,
    ) -> std::result::Result<SchemaInstance, CoercionError>;
}

/// Char-boundary-safe truncation. Returns the kept prefix and whether anything was dropped.
pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    match s.char_indices().nth(max_chars) {
        Some((byte, _)) => (s[..byte].to_string(), true),
        None => (s.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn search_results_are_capped_and_ordered() {
        let rs: Vec<SearchResult> = (0..5)
            .map(|i| SearchResult {
                title: format!("t{i}"),
                url: format!("https://example.com/{i}"),
                excerpt: String::new(),
            })
            .collect();
        let got: Vec<String> = SearchResults::new("stub", rs, 3).map(|r| r.title).collect();
        assert_eq!(got, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn search_query_limit_is_clamped() {
        assert_eq!(SearchQuery::new("q", 0).limit, 1);
        assert_eq!(SearchQuery::new("q", 500).limit, MAX_SEARCH_RESULTS);
    }

    #[test]
    fn whitespace_only_content_is_empty_error() {
        let err = NormalizedContent::new("https://example.com", " \n\t ", 100).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Empty);
    }

    #[test]
    fn content_past_limit_is_dropped_not_an_error() {
        let c = NormalizedContent::new("https://example.com", "héllo world", 5).unwrap();
        assert_eq!(c.text, "héllo");
        assert!(c.truncated);
    }

    #[test]
    fn blocked_statuses_are_distinguished() {
        assert_eq!(FetchErrorKind::from_http_status(403), FetchErrorKind::Blocked);
        assert_eq!(FetchErrorKind::from_http_status(429), FetchErrorKind::Blocked);
        assert_eq!(
            FetchErrorKind::from_http_status(500),
            FetchErrorKind::Unreachable
        );
    }

    #[test]
    fn non_http_urls_are_rejected() {
        assert!(parse_http_url("ftp://example.com").is_err());
        assert!(parse_http_url("not a url").is_err());
        assert!(parse_http_url("https://example.com/x").is_ok());
    }

    struct CountingFetcher;

    #[async_trait::async_trait]
    impl ContentFetcher for CountingFetcher {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, url: &str) -> std::result::Result<NormalizedContent, FetchError> {
            if url.contains("bad") {
                return Err(FetchError::timeout(url, "stub"));
            }
            NormalizedContent::new(url, url, 1_000)
        }
    }

    #[tokio::test]
    async fn fetch_batch_preserves_order_and_isolates_failures() {
        let urls = vec![
            "https://a.example".to_string(),
            "https://bad.example".to_string(),
            "https://c.example".to_string(),
        ];
        let out = CountingFetcher.fetch_batch(&urls).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().text, "https://a.example");
        assert_eq!(out[1].as_ref().unwrap_err().kind, FetchErrorKind::Timeout);
        assert_eq!(out[2].as_ref().unwrap().text, "https://c.example");
    }

    proptest! {
        #[test]
        fn truncate_chars_never_splits_a_char(s in any::<String>(), n in 0usize..64) {
            let (out, clipped) = truncate_chars(&s, n);
            prop_assert!(out.chars().count() <= n);
            prop_assert!(s.starts_with(&out));
            prop_assert_eq!(clipped, s.chars().count() > n);
        }
    }
}
