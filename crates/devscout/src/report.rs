//! Rendering a finished run for stdout.

use crate::state::{Degradation, Phase, RecommendationSource, RunState};
use devscout_core::ToolRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn render(state: &RunState, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(state),
        OutputFormat::Json => render_json(state),
    }
}

fn set_or_unknown(xs: &BTreeSet<String>) -> String {
    if xs.is_empty() {
        "unknown".to_string()
    } else {
        xs.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn tri(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

fn write_tool(out: &mut String, rank: usize, r: &ToolRecord) {
    let _ = writeln!(out, "{rank}. {}", r.name);
    let _ = writeln!(
        out,
        "   Website:      {}",
        r.website.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(out, "   Pricing:      {}", r.pricing_model);
    let _ = writeln!(out, "   Open source:  {}", tri(r.is_open_source));
    let _ = writeln!(out, "   Tech stack:   {}", set_or_unknown(&r.tech_stack));
    let _ = writeln!(out, "   Languages:    {}", set_or_unknown(&r.language_support));
    let _ = writeln!(out, "   API:          {}", if r.has_api { "yes" } else { "no" });
    let _ = writeln!(out, "   Integrations: {}", set_or_unknown(&r.integrations));
    if !r.description.trim().is_empty() {
        let _ = writeln!(out, "   {}", r.description.trim());
    }
    out.push('\n');
}

fn describe(d: &Degradation) -> String {
    match d {
        Degradation::SearchUnavailable { query, detail } => {
            format!("search unavailable for {query:?}: {detail}")
        }
        Degradation::DiscoveryFallback { primary_count } => format!(
            "discovery used title-only fallback (primary extraction found {primary_count})"
        ),
        Degradation::NoCandidates => "no candidate tools were discovered".to_string(),
        Degradation::CandidateDropped {
            name,
            reason,
            detail,
        } => format!("{name} dropped ({reason}): {detail}"),
        Degradation::SynthesisFallback { detail } => {
            format!("recommendation fell back to a fixed message: {detail}")
        }
    }
}

/// Ranked tools, then notes on anything degraded, then the recommendation.
pub fn render_text(state: &RunState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Developer tools for: {}", state.query());
    out.push('\n');

    if state.tool_records().is_empty() {
        out.push_str("No tools could be researched.\n\n");
    } else {
        for (i, r) in state.tool_records().iter().enumerate() {
            write_tool(&mut out, i + 1, r);
        }
    }

    if state.is_degraded() {
        out.push_str("Notes:\n");
        for d in state.degradations() {
            let _ = writeln!(out, "  - {}", describe(d));
        }
        out.push('\n');
    }

    let heading = match state.recommendation_source() {
        RecommendationSource::Degraded => "Recommendation (degraded)",
        _ => "Recommendation",
    };
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "{}", "-".repeat(heading.len()));
    let _ = writeln!(out, "{}", state.recommendation());
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: &'a str,
    phase: Phase,
    degraded: bool,
    candidates: &'a [String],
    tools: &'a [ToolRecord],
    notes: &'a [Degradation],
    recommendation: &'a str,
    recommendation_source: RecommendationSource,
}

pub fn render_json(state: &RunState) -> String {
    let report = JsonReport {
        query: state.query(),
        phase: state.phase(),
        degraded: state.is_degraded(),
        candidates: state.candidate_names(),
        tools: state.tool_records(),
        notes: state.degradations(),
        recommendation: state.recommendation(),
        recommendation_source: state.recommendation_source(),
    };
    serde_json::to_string_pretty(&report)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devscout_core::{PricingModel, ToolFacts};

    fn finished_state() -> RunState {
        let mut s = RunState::new("postgres hosting");
        s.set_candidates(["Supabase", "PlanetScale"]);
        let facts = ToolFacts {
            pricing_model: PricingModel::Freemium,
            is_open_source: Some(true),
            tech_stack: ["PostgreSQL".to_string()].into_iter().collect(),
            has_api: true,
            ..ToolFacts::default()
        };
        s.set_tool_records(vec![ToolRecord::from_facts(
            "Supabase",
            Some("https://supabase.com"),
            facts,
        )]);
        s.note(Degradation::CandidateDropped {
            name: "PlanetScale".to_string(),
            reason: "fetch_timeout".to_string(),
            detail: "slow".to_string(),
        });
        s.set_recommendation("Use Supabase.", RecommendationSource::Model);
        while s.advance().is_some() {}
        s
    }

    #[test]
    fn text_report_ranks_tools_then_notes_then_recommendation() {
        let txt = render_text(&finished_state());
        let tool = txt.find("1. Supabase").unwrap();
        let notes = txt.find("PlanetScale dropped (fetch_timeout)").unwrap();
        let rec = txt.find("Recommendation\n--------------\nUse Supabase.").unwrap();
        assert!(tool < notes && notes < rec);
        assert!(txt.contains("Pricing:      Freemium"));
        assert!(txt.contains("Languages:    unknown"));
    }

    #[test]
    fn degraded_recommendation_is_marked() {
        let mut s = RunState::new("q");
        s.set_recommendation("fixed", RecommendationSource::Degraded);
        assert!(render_text(&s).contains("Recommendation (degraded)"));
    }

    #[test]
    fn json_report_carries_notes_and_source() {
        let v: serde_json::Value = serde_json::from_str(&render_json(&finished_state())).unwrap();
        assert_eq!(v["phase"], "done");
        assert_eq!(v["degraded"], true);
        assert_eq!(v["candidates"][1], "PlanetScale");
        assert_eq!(v["tools"][0]["name"], "Supabase");
        assert_eq!(v["notes"][0]["kind"], "candidate_dropped");
        assert_eq!(v["recommendation_source"], "model");
    }
}
