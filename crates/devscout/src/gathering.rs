//! Evidence gathering: one official-site lookup, fetch and analysis per candidate.

use crate::config::PipelineConfig;
use crate::prompts;
use crate::state::{Degradation, RunState};
use devscout_core::schema::TOOL_FACTS;
use devscout_core::{
    Coercer, ContentFetcher, SearchProvider, SearchQuery, ToolFacts, ToolRecord,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Why a candidate produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dropped {
    reason: String,
    detail: String,
}

impl Dropped {
    fn new(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            detail: detail.into(),
        }
    }
}

pub struct EvidenceGathering<'a> {
    search: &'a dyn SearchProvider,
    fetcher: &'a dyn ContentFetcher,
    coercer: &'a dyn Coercer,
    cfg: &'a PipelineConfig,
}

impl<'a> EvidenceGathering<'a> {
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

    /// Populates `tool_records` in candidate order. Failed candidates are dropped and noted.
    pub async fn run(&self, state: &mut RunState) {
        let names: Vec<String> = state.candidate_names().to_vec();
        if names.is_empty() {
            state.set_tool_records(Vec::new());
            return;
        }

        // Completion order is arbitrary; the index puts it back.
        let mut tagged: Vec<(usize, Result<ToolRecord, Dropped>)> = stream::iter(
            names.iter().enumerate(),
        )
        .map(|(i, name)| async move { (i, self.gather_one(name).await) })
        .buffer_unordered(self.cfg.concurrency.max(1))
        .collect()
        .await;
        tagged.sort_by_key(|(i, _)| *i);

        let mut records = Vec::with_capacity(tagged.len());
        for (i, outcome) in tagged {
            match outcome {
                Ok(rec) => records.push(rec),
                Err(d) => {
                    warn!(
                        candidate = %names[i],
                        reason = %d.reason,
                        detail = %d.detail,
                        "candidate dropped"
                    );
                    state.note(Degradation::CandidateDropped {
                        name: names[i].clone(),
                        reason: d.reason,
                        detail: d.detail,
                    });
                }
            }
        }
        info!(
            candidates = names.len(),
            records = records.len(),
            "gathering done"
        );
        state.set_tool_records(records);
    }

    async fn gather_one(&self, name: &str) -> Result<ToolRecord, Dropped> {
        let q = SearchQuery::new(format!("{name} official site"), 1)
            .with_timeout_ms(self.cfg.timeout_ms);
        let mut results = self
            .search
            .search(&q)
            .await
            .map_err(|e| Dropped::new("search_unavailable", e.to_string()))?;
        let site = results
            .next()
            .map(|r| r.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                Dropped::new("no_official_site", format!("no results for {:?}", q.query))
            })?;
        debug!(candidate = name, url = %site, "official site");

        let content = self
            .fetcher
            .fetch(&site)
            .await
            .map_err(|e| Dropped::new(format!("fetch_{}", e.kind), e.message))?;
        debug!(
            candidate = name,
            chars = content.text.chars().count(),
            truncated = content.truncated,
            "official site fetched"
        );

        let ctx = prompts::tool_analysis(name, &site, &content.text);
        let facts: ToolFacts = self
            .coercer
            .coerce(&ctx, &TOOL_FACTS)
            .await
            .and_then(|inst| inst.into_typed())
            .map_err(|e| Dropped::new(format!("coercion_{}", e.reason()), e.to_string()))?;

        Ok(ToolRecord::from_facts(name, Some(content.url.as_str()), facts))
    }
}
