//! `devscout`: turn a question about developer tools into researched, comparable records
//! and a recommendation.
//!
//! A run is a small state machine (see [`pipeline::Pipeline`]) over three capabilities:
//! search, content fetch and schema coercion. Upstream failures degrade the report; they
//! never abort a run. Only [`setup::build_capabilities`] can fail.

pub mod config;
pub mod discovery;
pub mod gathering;
pub mod logging;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod setup;
pub mod state;
pub mod synthesis;

pub use config::PipelineConfig;
pub use pipeline::{Capabilities, Pipeline};
pub use report::OutputFormat;
pub use state::{Degradation, Phase, RecommendationSource, RunState};
