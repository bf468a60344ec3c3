//! [`LlmDecisionClient`]: the decision service backed by an LLM.
//!
//! One call renders the context into a prompt, sends it to the backend and
//! parses the reply. When the backend does not know the requested model and
//! a different fallback model is configured, the call is retried once with
//! the fallback. The scheduler's deadline covers all of it.

use core::time::Duration;
use std::collections::BTreeMap;

use ringside_core::config::LlmConfig;
use ringside_core::decision::{DecisionClient, DecisionError};
use ringside_types::{AgentActionResponse, AgentId, EventContext};
use tracing::{debug, warn};

use crate::error::RunnerError;
use crate::llm::{LlmBackend, LlmBackendConfig, create_backend};
use crate::parse::parse_response;
use crate::prompt::{PromptEngine, RenderedPrompt};

/// Asks an LLM for every decision.
pub struct LlmDecisionClient {
    backend: LlmBackend,
    prompts: PromptEngine,
    model: String,
    fallback_model: Option<String>,
    agent_models: BTreeMap<AgentId, String>,
}

impl LlmDecisionClient {
    /// Build a client from the show's `llm` section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, RunnerError> {
        let backend = create_backend(&LlmBackendConfig::try_from(config)?);
        let prompts = match &config.templates_dir {
            Some(dir) => PromptEngine::from_dir(dir)?,
            None => PromptEngine::builtin()?,
        };
        Ok(Self::new(
            backend,
            prompts,
            config.model.clone(),
            config.fallback_model.clone(),
        ))
    }

    /// Assemble a client from parts.
    pub fn new(
        backend: LlmBackend,
        prompts: PromptEngine,
        model: String,
        fallback_model: Option<String>,
    ) -> Self {
        Self {
            backend,
            prompts,
            model,
            fallback_model,
            agent_models: BTreeMap::new(),
        }
    }

    /// Use `model` instead of the default for one agent.
    pub fn set_agent_model(&mut self, agent_id: AgentId, model: impl Into<String>) {
        self.agent_models.insert(agent_id, model.into());
    }

    /// Name of the backend, for logging.
    pub const fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The model that answers for `agent_id`.
    pub fn model_for(&self, agent_id: AgentId) -> &str {
        self.agent_models
            .get(&agent_id)
            .map_or(self.model.as_str(), String::as_str)
    }

    /// The model to retry with after `model` was not found, if any.
    fn retry_model(&self, model: &str) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .filter(|fallback| *fallback != model)
    }

    async fn ask(
        &self,
        context: &EventContext,
        timeout: Duration,
    ) -> Result<AgentActionResponse, RunnerError> {
        let prompt: RenderedPrompt = self.prompts.render(context)?;
        let model = self.model_for(context.requesting_agent_id);
        debug!(
            agent_id = %context.requesting_agent_id,
            role = %context.role,
            model,
            backend = self.backend.name(),
            "requesting decision"
        );

        let text = match self.backend.complete(&prompt, model, timeout).await {
            Err(RunnerError::ModelNotFound { model: missing }) => {
                let Some(fallback) = self.retry_model(&missing) else {
                    return Err(RunnerError::ModelNotFound { model: missing });
                };
                warn!(
                    agent_id = %context.requesting_agent_id,
                    model = %missing,
                    fallback,
                    "model not found, retrying with fallback model"
                );
                self.backend.complete(&prompt, fallback, timeout).await?
            }
            other => other?,
        };

        parse_response(&text, context.role)
    }
}

impl DecisionClient for LlmDecisionClient {
    async fn decide(
        &self,
        context: &EventContext,
        timeout: Duration,
    ) -> Result<AgentActionResponse, DecisionError> {
        self.ask(context, timeout).await.map_err(DecisionError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(fallback: Option<&str>) -> LlmDecisionClient {
        let llm = LlmConfig {
            api_url: "http://127.0.0.1:9/v1".to_owned(),
            model: "long-gemma:latest".to_owned(),
            fallback_model: fallback.map(ToOwned::to_owned),
            ..LlmConfig::default()
        };
        LlmDecisionClient::from_config(&llm).unwrap()
    }

    #[test]
    fn agent_model_overrides_the_default() {
        let mut client = client(None);
        let special = AgentId::new();
        client.set_agent_model(special, "gpt-4o");
        assert_eq!(client.model_for(special), "gpt-4o");
        assert_eq!(client.model_for(AgentId::new()), "long-gemma:latest");
    }

    #[test]
    fn fallback_model_is_not_retried_against_itself() {
        let client = client(Some("gpt-4"));
        assert_eq!(client.retry_model("long-gemma:latest"), Some("gpt-4"));
        assert_eq!(client.retry_model("gpt-4"), None);
        assert_eq!(self::client(None).retry_model("gpt-4"), None);
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let llm = LlmConfig {
            backend: "telegraph".to_owned(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmDecisionClient::from_config(&llm),
            Err(RunnerError::Config(_))
        ));
    }

    #[test]
    fn missing_template_dir_is_a_template_error() {
        let llm = LlmConfig {
            templates_dir: Some(std::env::temp_dir().join("ringside_no_such_templates")),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmDecisionClient::from_config(&llm),
            Err(RunnerError::Template(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_service_error() {
        let client = client(None);
        let ctx = ringside_core::testing::sample_context(ringside_types::Role::Crowd);
        let err = client
            .decide(&ctx, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, DecisionError::Service { .. }));
    }
}
