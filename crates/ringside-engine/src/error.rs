//! Error types for the show runner binary.
//!
//! [`AppError`] wraps every failure mode of startup and the run itself so
//! `main` can propagate with `?`.

/// Top-level error for the binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ringside_core::config::ConfigError,
    },

    /// The engine refused to start or a tick failed fatally.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: ringside_core::engine::EngineError,
    },

    /// The LLM decision client could not be built.
    #[error("decision client error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: ringside_runner::error::RunnerError,
    },

    /// The result log could not be opened.
    #[error("result log error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: ringside_core::sink::SinkError,
    },
}
