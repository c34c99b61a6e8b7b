//! Prompt text for each model call in the pipeline.

use devscout_core::{truncate_chars, SearchResult, ToolRecord};

/// Shown when there is no evidence to recommend from.
pub const EMPTY_EVIDENCE_MESSAGE: &str = "No tools found: none of the candidate tools could be \
researched for this query. Try rephrasing it or naming a specific category of developer tool.";

/// Shown when the model could not produce a recommendation.
pub const DEGRADED_RECOMMENDATION: &str = "Recommendation unavailable: the analysis model could \
not be reached or returned an unusable answer. The tool summaries above are complete as listed.";

/// Queries derived from the user's query, in the order they are issued.
pub fn discovery_queries(query: &str, n: usize) -> Vec<String> {
    let q = query.trim();
    [format!("{q} tools comparison"), format!("{q} alternatives")]
        .into_iter()
        .take(n)
        .collect()
}

/// Numbered search evidence, cut to `max_chars` in total.
pub fn evidence_block(results: &[SearchResult], max_chars: usize) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        let entry = format!(
            "[{}] {}\nURL: {}\n{}\n\n",
            i + 1,
            r.title.trim(),
            r.url,
            r.excerpt.trim()
        );
        out.push_str(&entry);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    truncate_chars(&out, max_chars).0
}

pub fn tool_extraction(query: &str, evidence: &str) -> String {
    format!(
        "You are a technology researcher.\n\
         Query: {query}\n\n\
         Search evidence:\n{evidence}\n\
         List the specific developer tools, libraries, platforms or services named in the evidence \
         that are relevant to the query.\n\
         - Only actual product names, never generic terms or concepts.\n\
         - Include open source and commercial options.\n\
         - Most relevant first; at most 8 names.\n\
         Put them in `tool_names`."
    )
}

/// Stricter, title-only extraction used when the primary pass comes back thin.
pub fn tool_extraction_from_titles(query: &str, titles: &[String]) -> String {
    let mut lines = String::new();
    for t in titles {
        lines.push_str("- ");
        lines.push_str(t.trim());
        lines.push('\n');
    }
    format!(
        "Extract product names from these search result titles.\n\
         Copy names exactly as written. Do not add names that do not appear in a title.\n\
         Topic: {query}\n\
         Titles:\n{lines}\
         Put them in `tool_names`; use an empty array if there are none."
    )
}

pub fn tool_analysis(name: &str, url: &str, content: &str) -> String {
    format!(
        "Analyze this content from the official site of the developer tool \"{name}\" ({url}).\n\
         Focus on what matters to programmers: pricing, open source status, the technologies it \
         is built on or targets, supported programming languages, whether it has an API or SDK, \
         and what it integrates with.\n\n\
         Content:\n{content}"
    )
}

fn join_set(xs: &std::collections::BTreeSet<String>, max: usize) -> String {
    if xs.is_empty() {
        return "unknown".to_string();
    }
    xs.iter().take(max).cloned().collect::<Vec<_>>().join(", ")
}

fn open_source_label(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

pub fn recommendation(query: &str, records: &[ToolRecord]) -> String {
    let mut tools = String::new();
    for r in records {
        tools.push_str(&format!(
            "- {} | pricing: {} | open source: {} | tech stack: {} | languages: {} | API: {} | integrations: {}\n  {}\n",
            r.name,
            r.pricing_model,
            open_source_label(r.is_open_source),
            join_set(&r.tech_stack, 6),
            join_set(&r.language_support, 6),
            if r.has_api { "yes" } else { "no" },
            join_set(&r.integrations, 6),
            r.description.trim(),
        ));
    }
    format!(
        "Developer query: {query}\n\n\
         Researched tools:\n{tools}\n\
         Write a concise recommendation in 3-4 sentences: which tool fits best and why, \
         the key cost or licensing consideration, and the main technical trade-off. \
         Only use the facts above. Put it in `recommendation`."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_queries_respect_count_and_order() {
        assert_eq!(
            discovery_queries(" database ", 2),
            vec!["database tools comparison", "database alternatives"]
        );
        assert_eq!(discovery_queries("db", 1), vec!["db tools comparison"]);
    }

    #[test]
    fn evidence_block_is_bounded() {
        let rs: Vec<SearchResult> = (0..50)
            .map(|i| SearchResult {
                title: format!("Title {i}"),
                url: format!("https://example.com/{i}"),
                excerpt: "x".repeat(100),
            })
            .collect();
        let block = evidence_block(&rs, 500);
        assert!(block.chars().count() <= 500);
        assert!(block.starts_with("[1] Title 0"));
    }

    #[test]
    fn recommendation_prompt_marks_unknowns() {
        let r = ToolRecord::from_facts("Neon", None, devscout_core::ToolFacts::default());
        let p = recommendation("serverless postgres", &[r]);
        assert!(p.contains("- Neon | pricing: Unknown | open source: unknown"));
        assert!(p.contains("serverless postgres"));
    }
}
