//! The run controller: `Start -> Discovering -> Gathering -> Synthesizing -> Done`.

use crate::config::PipelineConfig;
use crate::discovery::ToolDiscovery;
use crate::gathering::EvidenceGathering;
use crate::state::{Phase, RunState};
use crate::synthesis::Synthesis;
use devscout_core::{Coercer, ContentFetcher, SearchProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// The three external capabilities every stage is built from.
#[derive(Clone)]
pub struct Capabilities {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub coercer: Arc<dyn Coercer>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("search", &self.search.name())
            .field("fetcher", &self.fetcher.name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    caps: Capabilities,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(caps: Capabilities, cfg: PipelineConfig) -> Self {
        Self {
            caps,
            cfg: cfg.normalized(),
        }
    }

    /// Make exactly one transition and run the stage it enters.
    ///
    /// Entering `Done` does no work. Stepping a finished run is a no-op.
    pub async fn step(&self, state: &mut RunState) -> Phase {
        let from = state.phase();
        let Some(to) = state.advance() else {
            return from;
        };
        let t0 = Instant::now();
        match to {
            Phase::Start | Phase::Done => {}
            Phase::Discovering => {
                ToolDiscovery::new(
                    self.caps.search.as_ref(),
                    self.caps.fetcher.as_ref(),
                    self.caps.coercer.as_ref(),
                    &self.cfg,
                )
                .run(state)
                .await
            }
            Phase::Gathering => {
                EvidenceGathering::new(
                    self.caps.search.as_ref(),
                    self.caps.fetcher.as_ref(),
                    self.caps.coercer.as_ref(),
                    &self.cfg,
                )
                .run(state)
                .await
            }
            Phase::Synthesizing => Synthesis::new(self.caps.coercer.as_ref()).run(state).await,
        }
        info!(
            from = ?from,
            to = ?to,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            degradations = state.degradations().len(),
            "phase"
        );
        to
    }

    /// Fresh state for `query`, stepped until `Done`.
    pub async fn run(&self, query: &str) -> RunState {
        let mut state = RunState::new(query.trim());
        while self.step(&mut state).await != Phase::Done {}
        state
    }
}
