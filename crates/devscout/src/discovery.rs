//! Tool discovery: user query in, ordered candidate names out.

use crate::config::PipelineConfig;
use crate::prompts;
use crate::state::{dedupe_names, Degradation, RunState};
use devscout_core::schema::TOOL_NAMES;
use devscout_core::{
    Coercer, CoercionError, ContentFetcher, SearchProvider, SearchQuery, SearchResult, ToolNames,
};
use tracing::{debug, info, warn};

pub struct ToolDiscovery<'a> {
    search: &'a dyn SearchProvider,
    fetcher: &'a dyn ContentFetcher,
    coercer: &'a dyn Coercer,
    cfg: &'a PipelineConfig,
}

impl<'a> ToolDiscovery<'a> {
    pub fn new(
        search: &'a dyn SearchProvider,
        fetcher: &'a dyn ContentFetcher,
        coercer: &'a dyn Coercer,
        cfg: &'a PipelineConfig,
    ) -> Self {
        Self {
            search,
            fetcher,
            coercer,
            cfg,
        }
    }

    /// Populates `candidate_names`. Never fails; upstream trouble ends up as notes on the state.
    pub async fn run(&self, state: &mut RunState) {
        let mut results = self.search_all(state).await;
        if results.is_empty() {
            info!(query = state.query(), "discovery: no search results");
            state.note(Degradation::NoCandidates);
            state.set_candidates(Vec::<String>::new());
            return;
        }
        if self.cfg.hydrate_discovery {
            self.hydrate(&mut results).await;
        }

        let evidence = prompts::evidence_block(&results, self.cfg.discovery_context_chars);
        let (mut names, primary_failed) = match self
            .extract(&prompts::tool_extraction(state.query(), &evidence))
            .await
        {
            Ok(names) => (names, false),
            Err(e) => {
                warn!(error = %e, "discovery: primary extraction failed");
                (Vec::new(), true)
            }
        };
        debug!(count = names.len(), "discovery: primary extraction");

        if primary_failed || names.len() < self.cfg.min_candidates_before_fallback {
            state.note(Degradation::DiscoveryFallback {
                primary_count: names.len(),
            });
            let titles: Vec<String> = results
                .iter()
                .map(|r| r.title.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if titles.is_empty() {
                debug!("discovery: no titles for fallback");
            } else {
                match self
                    .extract(&prompts::tool_extraction_from_titles(state.query(), &titles))
                    .await
                {
                    Ok(more) => names.extend(more),
                    Err(e) => warn!(error = %e, "discovery: fallback extraction failed"),
                }
            }
        }

        let mut names = dedupe_names(names);
        names.truncate(self.cfg.max_candidates);
        if names.is_empty() {
            state.note(Degradation::NoCandidates);
        }
        info!(candidates = ?names, "discovery done");
        state.set_candidates(names);
    }

    /// Results of every derived query, in query order.
    async fn search_all(&self, state: &mut RunState) -> Vec<SearchResult> {
        let mut out = Vec::new();
        for q in prompts::discovery_queries(state.query(), self.cfg.discovery_queries) {
            let sq = SearchQuery::new(q.as_str(), self.cfg.search_result_limit)
                .with_timeout_ms(self.cfg.timeout_ms);
            match self.search.search(&sq).await {
                Ok(rs) => {
                    let provider = rs.provider();
                    let before = out.len();
                    out.extend(rs);
                    debug!(
                        query = %q,
                        provider,
                        results = out.len() - before,
                        "discovery search"
                    );
                }
                Err(e) => {
                    warn!(query = %q, error = %e, "discovery search failed");
                    state.note(Degradation::SearchUnavailable {
                        query: q,
                        detail: e.to_string(),
                    });
                }
            }
        }
        out
    }

    /// Swap excerpts for fetched page text where the fetch works.
    async fn hydrate(&self, results: &mut [SearchResult]) {
        let urls: Vec<String> = results.iter().map(|r| r.url.clone()).collect();
        let fetched = self.fetcher.fetch_batch(&urls).await;
        let mut ok = 0usize;
        for (r, f) in results.iter_mut().zip(fetched) {
            match f {
                Ok(c) => {
                    r.excerpt = c.text;
                    ok += 1;
                }
                Err(e) => debug!(url = %r.url, kind = %e.kind, "hydrate: keeping excerpt"),
            }
        }
        debug!(ok, total = urls.len(), "discovery hydrate");
    }

    async fn extract(&self, context: &str) -> Result<Vec<String>, CoercionError> {
        let names: ToolNames = self
            .coercer
            .coerce(context, &TOOL_NAMES)
            .await?
            .into_typed()?;
        Ok(dedupe_names(names.tool_names))
    }
}
