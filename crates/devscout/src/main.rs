use anyhow::{Context, Result};
use clap::Parser;
use devscout::config::{self, PipelineConfig};
use devscout::logging::{self, LoggingConfig};
use devscout::report::{self, OutputFormat};
use devscout::setup::{self, FetchBackendChoice, SearchProviderChoice, SetupOptions};
use devscout::Pipeline;
use devscout_core::SetupError;
use std::io::IsTerminal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "devscout", version)]
#[command(
    about = "Discover, research and compare developer tools from a single query",
    long_about = None
)]
struct Cli {
    /// The query. Omit it to read queries from stdin, one per line.
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Keep reading queries from stdin after the argument query (if any).
    #[arg(long, short = 'i')]
    interactive: bool,

    #[arg(long, value_enum, env = "DEVSCOUT_OUTPUT", default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[arg(
        long,
        value_enum,
        env = "DEVSCOUT_SEARCH_PROVIDER",
        default_value_t = SearchProviderChoice::Auto
    )]
    search_provider: SearchProviderChoice,

    #[arg(
        long,
        value_enum,
        env = "DEVSCOUT_FETCH_BACKEND",
        default_value_t = FetchBackendChoice::Auto
    )]
    fetch_backend: FetchBackendChoice,

    /// Chat model name passed to the OpenAI-compatible endpoint.
    #[arg(long, env = "DEVSCOUT_MODEL")]
    model: Option<String>,

    /// Results requested per search call (1..=20).
    #[arg(long, env = "DEVSCOUT_SEARCH_RESULT_LIMIT", default_value_t = 5)]
    search_result_limit: usize,

    #[arg(long, env = "DEVSCOUT_MODEL_TEMPERATURE", default_value_t = 0.1)]
    model_temperature: f64,

    /// Below this many discovered names, discovery retries on result titles only.
    #[arg(long = "min-candidates", env = "DEVSCOUT_MIN_CANDIDATES", default_value_t = 2)]
    min_candidates_before_fallback: usize,

    #[arg(long, env = "DEVSCOUT_MAX_CANDIDATES", default_value_t = 4)]
    max_candidates: usize,

    /// Derived search queries issued during discovery (1 or 2).
    #[arg(long, env = "DEVSCOUT_DISCOVERY_QUERIES", default_value_t = 2)]
    discovery_queries: usize,

    #[arg(long, env = "DEVSCOUT_DISCOVERY_CONTEXT_CHARS", default_value_t = 6_000)]
    discovery_context_chars: usize,

    /// Fetch each discovery result and use its text instead of the search excerpt.
    #[arg(
        long,
        env = "DEVSCOUT_HYDRATE_DISCOVERY",
        action = clap::ArgAction::Set,
        default_value_t = false
    )]
    hydrate_discovery: bool,

    /// Cap on extracted page text, in chars.
    #[arg(long, env = "DEVSCOUT_MAX_CONTENT_CHARS", default_value_t = 8_000)]
    max_content_chars: usize,

    /// Per network call.
    #[arg(long, env = "DEVSCOUT_TIMEOUT_MS", default_value_t = 20_000)]
    timeout_ms: u64,

    /// Candidates researched in parallel.
    #[arg(long, env = "DEVSCOUT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// trace|debug|info|warn|error. DEVSCOUT_LOG / RUST_LOG take precedence.
    #[arg(long, env = "DEVSCOUT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[arg(long, env = "DEVSCOUT_LOG_JSON", action = clap::ArgAction::Set, default_value_t = false)]
    log_json: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, SetupError> {
        let cfg = PipelineConfig {
            search_result_limit: self.search_result_limit,
            model_temperature: self.model_temperature,
            min_candidates_before_fallback: self.min_candidates_before_fallback,
            max_candidates: self.max_candidates,
            discovery_queries: self.discovery_queries,
            discovery_context_chars: self.discovery_context_chars,
            hydrate_discovery: self.hydrate_discovery,
            max_content_chars: self.max_content_chars,
            timeout_ms: self.timeout_ms,
            concurrency: self.concurrency,
        };
        cfg.validate()?;
        Ok(cfg.normalized())
    }

    fn setup_options(&self) -> SetupOptions {
        SetupOptions {
            search_provider: self.search_provider,
            fetch_backend: self.fetch_backend,
            model: self.model.clone(),
        }
    }
}

async fn run_one(pipeline: &Pipeline, query: &str, output: OutputFormat) {
    let state = pipeline.run(query).await;
    let rendered = report::render(&state, output);
    println!("{}", rendered.trim_end());
}

/// One query per line until `quit`, `exit` or EOF.
async fn interactive(pipeline: &Pipeline, output: OutputFormat) {
    let prompt = std::io::stdin().is_terminal();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        if prompt {
            eprint!("\ndevscout> ");
        }
        buf.clear();
        match stdin.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "stdin read failed; leaving interactive mode");
                break;
            }
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(bytes = buf.len(), "skipping input line that is not UTF-8");
            continue;
        };
        let q = line.trim();
        if q.is_empty() {
            continue;
        }
        if q.eq_ignore_ascii_case("quit") || q.eq_ignore_ascii_case("exit") {
            break;
        }
        run_one(pipeline, q, output).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Opt-in; never overrides the process environment and never logs values.
    config::load_env_file_from_env();

    let cli = Cli::parse();
    logging::init(LoggingConfig {
        level: logging::parse_level(&cli.log_level),
        use_json: cli.log_json,
        ..LoggingConfig::default()
    });

    let cfg = cli.pipeline_config().context("setup failed")?;
    let caps = setup::build_capabilities(&cli.setup_options(), &cfg).context("setup failed")?;
    let pipeline = Pipeline::new(caps, cfg);

    let query = cli.query.join(" ");
    let query = query.trim();
    if !query.is_empty() {
        run_one(&pipeline, query, cli.output).await;
    }
    if query.is_empty() || cli.interactive {
        interactive(&pipeline, cli.output).await;
    }
    Ok(())
}
