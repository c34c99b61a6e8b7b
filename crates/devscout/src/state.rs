use devscout_core::ToolRecord;
use serde::Serialize;
use std::collections::HashSet;

/// Where a run is. Transitions only move forward, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Discovering,
    Gathering,
    Synthesizing,
    Done,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Start => Some(Phase::Discovering),
            Phase::Discovering => Some(Phase::Gathering),
            Phase::Gathering => Some(Phase::Synthesizing),
            Phase::Synthesizing => Some(Phase::Done),
            Phase::Done => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Pending,
    Model,
    /// No tool records; the model was not asked.
    EmptyEvidence,
    /// The model call failed; a fixed message stands in.
    Degraded,
}

/// Something that went wrong but did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    SearchUnavailable { query: String, detail: String },
    DiscoveryFallback { primary_count: usize },
    NoCandidates,
    CandidateDropped {
        name: String,
        reason: String,
        detail: String,
    },
    SynthesisFallback { detail: String },
}

/// Case-insensitive, first-seen-wins dedupe. Blank names are dropped and the rest trimmed.
pub fn dedupe_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for n in names {
        let n = n.as_ref().trim();
        if n.is_empty() {
            continue;
        }
        if seen.insert(n.to_lowercase()) {
            out.push(n.to_string());
        }
    }
    out
}

/// All state for one query. Owned by the pipeline controller for the run's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    query: String,
    phase: Phase,
    candidate_names: Vec<String>,
    tool_records: Vec<ToolRecord>,
    recommendation: String,
    recommendation_source: RecommendationSource,
    degradations: Vec<Degradation>,
}

impl RunState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            phase: Phase::Start,
            candidate_names: Vec::new(),
            tool_records: Vec::new(),
            recommendation: String::new(),
            recommendation_source: RecommendationSource::Pending,
            degradations: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn candidate_names(&self) -> &[String] {
        &self.candidate_names
    }

    pub fn tool_records(&self) -> &[ToolRecord] {
        &self.tool_records
    }

    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }

    pub fn recommendation_source(&self) -> RecommendationSource {
        self.recommendation_source
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    /// True when anything fell back or was dropped.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub(crate) fn advance(&mut self) -> Option<Phase> {
        let next = self.phase.next()?;
        self.phase = next;
        Some(next)
    }

    pub(crate) fn set_candidates<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.candidate_names = dedupe_names(names);
    }

    /// Keeps only records that follow candidate order, one per candidate.
    pub(crate) fn set_tool_records(&mut self, records: Vec<ToolRecord>) {
        let mut kept = Vec::with_capacity(records.len());
        let mut cursor = 0usize;
        for rec in records {
            let key = rec.name.to_lowercase();
            let pos = self.candidate_names[cursor..]
                .iter()
                .position(|c| c.to_lowercase() == key);
            if let Some(p) = pos {
                cursor += p + 1;
                kept.push(rec);
            }
        }
        self.tool_records = kept;
    }

    pub(crate) fn set_recommendation(
        &mut self,
        text: impl Into<String>,
        source: RecommendationSource,
    ) {
        self.recommendation = text.into();
        self.recommendation_source = source;
    }

    pub(crate) fn note(&mut self, d: Degradation) {
        self.degradations.push(d);
    }
}
