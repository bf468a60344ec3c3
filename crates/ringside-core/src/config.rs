//! Configuration loading and typed config structures for a Ringside show.
//!
//! The canonical configuration lives in `ringside-config.yaml` at the project
//! root. Every field has a serde default, so an empty file is a valid
//! configuration. [`ShowConfig::validate`] runs before any tick and turns
//! nonsensical settings into [`ConfigError::Invalid`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible show.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level show configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShowConfig {
    /// Show-level settings (name, seed, run length).
    #[serde(default)]
    pub show: ShowSettings,

    /// Heat and momentum bounds.
    #[serde(default)]
    pub bounds: BoundsConfig,

    /// Decision dispatch settings (timeouts, retries, degradation).
    #[serde(default)]
    pub decision: DecisionConfig,

    /// LLM backend configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where tick results are written.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Agents taking part in the show.
    #[serde(default)]
    pub roster: Vec<RosterEntry>,

    /// Rivalries between roster wrestlers.
    #[serde(default)]
    pub feuds: Vec<FeudEntry>,
}

impl ShowConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate the result.
    ///
    /// Environment variables override YAML values:
    /// - `OPENAI_API_BASE` overrides `llm.api_url`
    /// - `OPENAI_API_KEY` overrides `llm.api_key`
    /// - `OPENAI_MODEL` overrides `llm.model`
    /// - `SHOW_TICKS` overrides `show.ticks`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string. No environment
    /// overrides are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Override LLM and run-length settings from environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("OPENAI_API_BASE") {
            self.llm.api_url = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(val).filter(|k| !k.trim().is_empty());
        }
        if let Ok(val) = std::env::var("OPENAI_MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = std::env::var("SHOW_TICKS") {
            self.show.ticks = val
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(format!("SHOW_TICKS={val}: {e}")))?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.bounds;
        check_range("heat", b.heat_min, b.heat_max, b.initial_heat)?;
        check_range("momentum", b.momentum_min, b.momentum_max, b.initial_momentum)?;
        check_range(
            "entity heat",
            b.entity_heat_min,
            b.entity_heat_max,
            b.entity_heat_min,
        )?;
        if b.max_entity_delta <= 0 {
            return Err(ConfigError::invalid(
                "bounds.max_entity_delta must be positive",
            ));
        }

        let d = &self.decision;
        if d.timeout_ms == 0 {
            return Err(ConfigError::invalid("decision.timeout_ms must be non-zero"));
        }
        if d.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::invalid(format!(
                "decision.timeout_ms must be at most {MAX_TIMEOUT_MS}"
            )));
        }
        if d.max_attempts == 0 {
            return Err(ConfigError::invalid("decision.max_attempts must be non-zero"));
        }
        if d.degrade_after_failures == 0 {
            return Err(ConfigError::invalid(
                "decision.degrade_after_failures must be non-zero",
            ));
        }

        for feud in &self.feuds {
            if feud.wrestlers.len() != 2 {
                return Err(ConfigError::invalid(format!(
                    "feud `{}` must name exactly two wrestlers",
                    feud.name
                )));
            }
            if feud.heat < b.entity_heat_min || feud.heat > b.entity_heat_max {
                return Err(ConfigError::invalid(format!(
                    "feud `{}` heat {} is outside [{}, {}]",
                    feud.name, feud.heat, b.entity_heat_min, b.entity_heat_max
                )));
            }
        }
        Ok(())
    }
}

/// Longest per-decision deadline accepted: one hour.
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

fn check_range(what: &str, min: i64, max: i64, initial: i64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::invalid(format!(
            "{what} bounds are inverted ({min} > {max})"
        )));
    }
    if initial < min || initial > max {
        return Err(ConfigError::invalid(format!(
            "initial {what} {initial} is outside [{min}, {max}]"
        )));
    }
    Ok(())
}

/// Show-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShowSettings {
    /// Human-readable show name.
    #[serde(default = "default_show_name")]
    pub name: String,

    /// Seed for the fallback policy's random choices.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of ticks the binary runs.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Match rules reported in every match context.
    #[serde(default = "default_stipulation")]
    pub stipulation: String,
}

impl Default for ShowSettings {
    fn default() -> Self {
        Self {
            name: default_show_name(),
            seed: default_seed(),
            ticks: default_ticks(),
            stipulation: default_stipulation(),
        }
    }
}

/// Heat and momentum bounds.
///
/// Overall heat and momentum are clamped to `[min, max]` after every fold.
/// Wrestler and feud heat use the entity bounds, and a single application
/// to an entity is limited to `max_entity_delta` in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoundsConfig {
    /// Lowest overall heat.
    #[serde(default)]
    pub heat_min: i64,
    /// Highest overall heat.
    #[serde(default = "default_hundred")]
    pub heat_max: i64,
    /// Overall heat when the show opens.
    #[serde(default = "default_initial_heat")]
    pub initial_heat: i64,
    /// Lowest overall momentum.
    #[serde(default)]
    pub momentum_min: i64,
    /// Highest overall momentum.
    #[serde(default = "default_hundred")]
    pub momentum_max: i64,
    /// Overall momentum when the show opens.
    #[serde(default)]
    pub initial_momentum: i64,
    /// Lowest wrestler or feud heat.
    #[serde(default)]
    pub entity_heat_min: i64,
    /// Highest wrestler or feud heat.
    #[serde(default = "default_hundred")]
    pub entity_heat_max: i64,
    /// Largest change applied to one entity in one update.
    #[serde(default = "default_max_entity_delta")]
    pub max_entity_delta: i64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            heat_min: 0,
            heat_max: default_hundred(),
            initial_heat: default_initial_heat(),
            momentum_min: 0,
            momentum_max: default_hundred(),
            initial_momentum: 0,
            entity_heat_min: 0,
            entity_heat_max: default_hundred(),
            max_entity_delta: default_max_entity_delta(),
        }
    }
}

/// Decision dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecisionConfig {
    /// Hard deadline for one agent's decision, retries included.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts against the decision service within one deadline.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Consecutive failed attempts after which an agent is degraded and
    /// no longer asked for the rest of the run.
    #[serde(default = "default_degrade_after_failures")]
    pub degrade_after_failures: u32,

    /// Issue calls for all agents of a role at once.
    #[serde(default = "default_true")]
    pub concurrent_dispatch: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            degrade_after_failures: default_degrade_after_failures(),
            concurrent_dispatch: true,
        }
    }
}

/// LLM backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// Backend type (`openai` or `anthropic`).
    #[serde(default = "default_llm_backend")]
    pub backend: String,

    /// Base URL of the API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Local OpenAI-compatible proxies do not need one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model retried once when the primary model fails.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Response token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Directory of prompt templates overriding the built-in ones.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

impl LlmConfig {
    /// Whether the API base points at this machine.
    pub fn is_local(&self) -> bool {
        let url = self.api_url.to_lowercase();
        url.contains("://localhost") || url.contains("://127.0.0.1") || url.contains("://[::1]")
    }

    /// Whether there is anything to talk to: a key, or a local proxy.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.is_local()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_llm_backend(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            templates_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Result sink configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SinkConfig {
    /// JSON-lines file receiving tick results. No file is written when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One agent on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    /// Display name; unique across the roster.
    pub name: String,

    /// Role name. Checked against the closed role set when the roster is
    /// built, not here, so an unknown role surfaces as a roster error.
    pub role: String,

    /// Wrestling gimmick.
    #[serde(default)]
    pub gimmick: Option<String>,

    /// Free-form persona hints passed to the decision service.
    #[serde(default)]
    pub persona: Option<String>,

    /// Per-agent model override.
    #[serde(default)]
    pub model: Option<String>,
}

/// A rivalry between two roster wrestlers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeudEntry {
    /// Display name of the feud.
    pub name: String,

    /// Roster names of the two sides.
    pub wrestlers: Vec<String>,

    /// Starting heat.
    #[serde(default)]
    pub heat: i64,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_show_name() -> String {
    "Ringside Live".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_ticks() -> u64 {
    10
}

fn default_stipulation() -> String {
    "StandardMatch".to_owned()
}

const fn default_hundred() -> i64 {
    100
}

const fn default_initial_heat() -> i64 {
    50
}

const fn default_max_entity_delta() -> i64 {
    10
}

const fn default_timeout_ms() -> u64 {
    8_000
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_degrade_after_failures() -> u32 {
    3
}

fn default_llm_backend() -> String {
    "openai".to_owned()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_owned()
}

fn default_model() -> String {
    "gpt-4o-mini".to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_fallback_model() -> Option<String> {
    Some("gpt-4".to_owned())
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    512
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
