//! Analysis and synthesis: tool records in, one recommendation out.

use crate::prompts;
use crate::state::{Degradation, RecommendationSource, RunState};
use devscout_core::schema::RECOMMENDATION;
use devscout_core::{Coercer, Recommendation};
use tracing::{info, warn};

pub struct Synthesis<'a> {
    coercer: &'a dyn Coercer,
}

impl<'a> Synthesis<'a> {
    pub fn new(coercer: &'a dyn Coercer) -> Self {
        Self { coercer }
    }

    /// Always leaves a non-empty recommendation behind.
    pub async fn run(&self, state: &mut RunState) {
        if state.tool_records().is_empty() {
            info!("synthesis: no records, skipping model");
            state.set_recommendation(
                prompts::EMPTY_EVIDENCE_MESSAGE,
                RecommendationSource::EmptyEvidence,
            );
            return;
        }

        let ctx = prompts::recommendation(state.query(), state.tool_records());
        let outcome = self
            .coercer
            .coerce(&ctx, &RECOMMENDATION)
            .await
            .and_then(|inst| inst.into_typed::<Recommendation>());
        match outcome {
            Ok(r) if !r.recommendation.trim().is_empty() => {
                info!(records = state.tool_records().len(), "synthesis done");
                state.set_recommendation(r.recommendation.trim(), RecommendationSource::Model);
            }
            Ok(_) => {
                warn!("synthesis: model returned a blank recommendation");
                state.note(Degradation::SynthesisFallback {
                    detail: "blank recommendation".to_string(),
                });
                state.set_recommendation(
                    prompts::DEGRADED_RECOMMENDATION,
                    RecommendationSource::Degraded,
                );
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed");
                state.note(Degradation::SynthesisFallback {
                    detail: e.to_string(),
                });
                state.set_recommendation(
                    prompts::DEGRADED_RECOMMENDATION,
                    RecommendationSource::Degraded,
                );
            }
        }
    }
}
