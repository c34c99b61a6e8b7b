//! Structured logging setup.
//!
//! Everything goes to stderr so the report on stdout stays machine-readable.
//! The filter is taken from `DEVSCOUT_LOG`, then `RUST_LOG`, then the configured level.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// JSON lines instead of human-readable output.
    pub use_json: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            use_json: false,
            include_target: true,
        }
    }
}

/// Unknown names fall back to `warn`.
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

fn filter_for(config: &LoggingConfig) -> EnvFilter {
    for var in ["DEVSCOUT_LOG", "RUST_LOG"] {
        if let Ok(spec) = std::env::var(var) {
            if let Ok(f) = EnvFilter::try_new(spec.trim()) {
                if !spec.trim().is_empty() {
                    return f;
                }
            }
        }
    }
    // Dependency chatter stays at warn unless asked for explicitly.
    EnvFilter::new(format!(
        "warn,devscout={lvl},devscout_core={lvl},devscout_local={lvl}",
        lvl = config.level
    ))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = filter_for(&config);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target);
        // A subscriber installed elsewhere (tests, embedding) wins.
        let _ = if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        };
    });
}
