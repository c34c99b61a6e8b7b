use devscout_core::SetupError;
use serde::Serialize;
use std::path::Path;

/// Tunables for one pipeline run.
///
/// The defaults have no deeper derivation than "works for typical queries"; every one
/// of them is exposed on the command line.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Results requested per search call.
    pub search_result_limit: usize,
    pub model_temperature: f64,
    /// Discovery falls back to title-only extraction below this many names.
    pub min_candidates_before_fallback: usize,
    /// Discovery output is cut to this many names.
    pub max_candidates: usize,
    /// How many derived search queries discovery issues (1 or 2).
    pub discovery_queries: usize,
    /// Bound on the excerpt text handed to the model during discovery.
    pub discovery_context_chars: usize,
    /// Replace search excerpts with fetched article text during discovery.
    pub hydrate_discovery: bool,
    /// Cap on normalized page text, in chars.
    pub max_content_chars: usize,
    /// Per network call.
    pub timeout_ms: u64,
    /// Candidates gathered in parallel.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_result_limit: 5,
            model_temperature: 0.1,
            min_candidates_before_fallback: 2,
            max_candidates: 4,
            discovery_queries: 2,
            discovery_context_chars: 6_000,
            hydrate_discovery: false,
            max_content_chars: 8_000,
            timeout_ms: 20_000,
            concurrency: 4,
        }
    }
}

impl PipelineConfig {
    /// Reject values no clamp can make sensible.
    pub fn validate(&self) -> Result<(), SetupError> {
        let invalid = |name: &'static str, message: String| {
            Err(SetupError::InvalidOption { name, message })
        };
        if !(0.0..=2.0).contains(&self.model_temperature) {
            return invalid(
                "model_temperature",
                format!("{} is outside 0.0..=2.0", self.model_temperature),
            );
        }
        if self.search_result_limit == 0 {
            return invalid("search_result_limit", "must be at least 1".to_string());
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates", "must be at least 1".to_string());
        }
        if !(1..=2).contains(&self.discovery_queries) {
            return invalid(
                "discovery_queries",
                format!("{} is not 1 or 2", self.discovery_queries),
            );
        }
        if self.concurrency == 0 {
            return invalid("concurrency", "must be at least 1".to_string());
        }
        if self.timeout_ms == 0 {
            return invalid("timeout_ms", "must be positive".to_string());
        }
        Ok(())
    }

    /// Clamp every knob into its usable range.
    pub fn normalized(mut self) -> Self {
        self.search_result_limit = self
            .search_result_limit
            .clamp(1, devscout_core::MAX_SEARCH_RESULTS);
        self.model_temperature = if self.model_temperature.is_finite() {
            self.model_temperature.clamp(0.0, 2.0)
        } else {
            0.1
        };
        self.max_candidates = self.max_candidates.max(1);
        self.discovery_queries = self.discovery_queries.clamp(1, 2);
        self.discovery_context_chars = self.discovery_context_chars.max(200);
        self.max_content_chars = self.max_content_chars.max(200);
        self.timeout_ms = self.timeout_ms.clamp(1_000, 300_000);
        self.concurrency = self.concurrency.clamp(1, 16);
        self
    }
}

/// Load `KEY=VALUE` lines from the file named by `DEVSCOUT_ENV_FILE`.
///
/// Opt-in only. Variables already present in the process environment win. Values are never logged.
pub fn load_env_file_from_env() -> usize {
    match std::env::var("DEVSCOUT_ENV_FILE") {
        Ok(p) if !p.trim().is_empty() => load_env_file(Path::new(p.trim())),
        _ => 0,
    }
}

/// Returns how many variables were set.
pub fn load_env_file(path: &Path) -> usize {
    let Ok(txt) = std::fs::read_to_string(path) else {
        return 0;
    };
    let mut n = 0;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim().trim_start_matches("export ").trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    n
}
