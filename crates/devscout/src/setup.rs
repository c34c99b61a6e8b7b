//! Turning options and environment into live capabilities.
//!
//! This is the only place a run can fail outright: everything here happens before the
//! first stage, and every error is a `SetupError`.

use crate::config::PipelineConfig;
use crate::pipeline::Capabilities;
use devscout_core::{ContentFetcher, SearchProvider, SetupError};
use devscout_local::coerce::{CoercerOptions, ModelCoercer};
use devscout_local::firecrawl::FirecrawlClient;
use devscout_local::openai_compat::OpenAiCompatClient;
use devscout_local::search::{BraveSearchProvider, SearxngSearchProvider, TavilySearchProvider};
use devscout_local::{http_client, FetchLimits, LocalFetcher};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SearchProviderChoice {
    /// First configured of firecrawl, brave, tavily, searxng.
    #[default]
    Auto,
    Firecrawl,
    Brave,
    Tavily,
    Searxng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FetchBackendChoice {
    /// Firecrawl when a key is present, else local.
    #[default]
    Auto,
    Firecrawl,
    Local,
}

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub search_provider: SearchProviderChoice,
    pub fetch_backend: FetchBackendChoice,
    /// Model name; `None` uses the client default.
    pub model: Option<String>,
}

fn build_search(
    choice: SearchProviderChoice,
    client: &reqwest::Client,
    limits: FetchLimits,
) -> Result<Arc<dyn SearchProvider>, SetupError> {
    let choice = match choice {
        SearchProviderChoice::Auto => {
            if FirecrawlClient::is_configured() {
                SearchProviderChoice::Firecrawl
            } else if BraveSearchProvider::is_configured() {
                SearchProviderChoice::Brave
            } else if TavilySearchProvider::is_configured() {
                SearchProviderChoice::Tavily
            } else if SearxngSearchProvider::is_configured() {
                SearchProviderChoice::Searxng
            } else {
                return Err(SetupError::MissingCredential(
                    "a search provider (DEVSCOUT_FIRECRAWL_API_KEY, DEVSCOUT_BRAVE_API_KEY, \
                     DEVSCOUT_TAVILY_API_KEY or DEVSCOUT_SEARXNG_ENDPOINT)"
                        .to_string(),
                ));
            }
        }
        other => other,
    };
    let provider: Arc<dyn SearchProvider> = match choice {
        SearchProviderChoice::Firecrawl => {
            Arc::new(FirecrawlClient::from_env(client.clone(), limits)?)
        }
        SearchProviderChoice::Brave => Arc::new(BraveSearchProvider::from_env(client.clone())?),
        SearchProviderChoice::Tavily => Arc::new(TavilySearchProvider::from_env(client.clone())?),
        SearchProviderChoice::Searxng | SearchProviderChoice::Auto => {
            Arc::new(SearxngSearchProvider::from_env(client.clone())?)
        }
    };
    Ok(provider)
}

fn build_fetcher(
    choice: FetchBackendChoice,
    client: &reqwest::Client,
    limits: FetchLimits,
) -> Result<Arc<dyn ContentFetcher>, SetupError> {
    let fetcher: Arc<dyn ContentFetcher> = match choice {
        FetchBackendChoice::Firecrawl => {
            Arc::new(FirecrawlClient::from_env(client.clone(), limits)?)
        }
        FetchBackendChoice::Auto if FirecrawlClient::is_configured() => {
            Arc::new(FirecrawlClient::from_env(client.clone(), limits)?)
        }
        FetchBackendChoice::Auto | FetchBackendChoice::Local => {
            Arc::new(LocalFetcher::new(client.clone(), limits))
        }
    };
    Ok(fetcher)
}

/// Build every capability or fail with the first missing piece. The model comes first.
pub fn build_capabilities(
    opts: &SetupOptions,
    cfg: &PipelineConfig,
) -> Result<Capabilities, SetupError> {
    let client = http_client()?;
    let limits = FetchLimits {
        timeout_ms: cfg.timeout_ms,
        max_chars: cfg.max_content_chars,
        ..FetchLimits::default()
    };

    let model = OpenAiCompatClient::from_env(client.clone(), opts.model.clone())?;
    info!(base_url = model.base_url(), "model client ready");
    let coercer = ModelCoercer::new(
        Arc::new(model),
        CoercerOptions {
            temperature: cfg.model_temperature,
            // Completions run longer than page fetches.
            timeout_ms: cfg.timeout_ms.saturating_mul(3),
            ..CoercerOptions::default()
        },
    );

    let search = build_search(opts.search_provider, &client, limits)?;
    let fetcher = build_fetcher(opts.fetch_backend, &client, limits)?;
    info!(search = search.name(), fetch = fetcher.name(), "capabilities ready");

    Ok(Capabilities {
        search,
        fetcher,
        coercer: Arc::new(coercer),
    })
}
