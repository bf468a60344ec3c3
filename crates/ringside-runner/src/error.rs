//! Error types for the decision runner.
//!
//! Everything surfaces to the scheduler as a
//! [`DecisionError`](ringside_core::decision::DecisionError): parse failures
//! become `Malformed`, everything else `Service`.

use ringside_core::decision::DecisionError;

/// Errors that can occur while producing a decision.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A prompt template is missing or failed to render.
    #[error("template error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The backend does not know the requested model.
    #[error("model not found: {model}")]
    ModelNotFound {
        /// The model that was requested.
        model: String,
    },

    /// The LLM response could not be turned into an action.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The LLM configuration is unusable.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<RunnerError> for DecisionError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Parse(message) => Self::Malformed { message },
            other => Self::service(other.to_string()),
        }
    }
}
