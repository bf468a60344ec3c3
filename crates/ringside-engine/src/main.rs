//! Show runner binary for the Ringside simulation.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `ringside-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Build the roster, seeding a demo card when none is configured
//! 4. Pick the decision client: the LLM when one is configured, otherwise
//!    a stub that leaves every choice to the fallback policy
//! 5. Open the JSON-lines result log, if configured
//! 6. Run `show.ticks` ticks and log a summary

mod directory;
mod error;
mod sink;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use ringside_core::config::ShowConfig;
use ringside_core::decision::{DecisionClient, StubDecisionClient};
use ringside_core::engine::Engine;
use ringside_core::roster::{AgentProfile, InMemoryDirectory};
use ringside_core::sink::{NullSink, ResultSink};
use ringside_runner::client::LlmDecisionClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::sink::JsonlSink;

const DEFAULT_CONFIG: &str = "ringside-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_logging(&config);
    info!(
        show = %config.show.name,
        seed = config.show.seed,
        ticks = config.show.ticks,
        timeout_ms = config.decision.timeout_ms,
        max_attempts = config.decision.max_attempts,
        concurrent = config.decision.concurrent_dispatch,
        "Configuration loaded"
    );

    let profiles = directory::roster_profiles(&config);
    let sink = open_sink(&config)?;

    if config.llm.is_configured() {
        let mut client = LlmDecisionClient::from_config(&config.llm).map_err(AppError::from)?;
        for profile in &profiles {
            if let Some(model) = &profile.model {
                client.set_agent_model(profile.id, model.clone());
            }
        }
        info!(
            backend = client.backend_name(),
            model = %config.llm.model,
            api_url = %config.llm.api_url,
            "LLM decision client configured"
        );
        run_show(&config, client, profiles, sink).await?;
    } else {
        warn!("No API key and no local API base; every decision comes from the fallback policy");
        run_show(&config, StubDecisionClient::new(), profiles, sink).await?;
    }

    info!("ringside-engine shutdown complete");
    Ok(())
}

/// Load the show configuration. A missing file means defaults, with the
/// environment overrides still applied.
fn load_config(path: &Path) -> Result<ShowConfig, AppError> {
    if path.exists() {
        return Ok(ShowConfig::from_file(path)?);
    }
    let mut config = ShowConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &ShowConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_sink(config: &ShowConfig) -> Result<Box<dyn ResultSink>, AppError> {
    match &config.sink.path {
        Some(path) => {
            info!(path = %path.display(), "Writing results as JSON lines");
            Ok(Box::new(JsonlSink::open(path)?))
        }
        None => Ok(Box::new(NullSink)),
    }
}

async fn run_show<D: DecisionClient>(
    config: &ShowConfig,
    client: D,
    profiles: Vec<AgentProfile>,
    sink: Box<dyn ResultSink>,
) -> Result<(), AppError> {
    let directory = Box::new(InMemoryDirectory::new(profiles));
    let mut engine = Engine::new(config, client, directory, sink)?;

    let summary = engine.run_to_sink(config.show.ticks).await?;

    let degraded = engine.health().degraded().count();
    let end = engine.snapshot();
    info!(
        ticks = summary.ticks,
        applied = summary.applied,
        rejected = summary.rejected,
        degraded,
        heat = end.heat,
        momentum = end.momentum,
        phase = ?end.phase,
        "Show complete"
    );
    Ok(())
}
