//! LLM backend abstraction and implementations.
//!
//! Enum dispatch over the supported HTTP APIs, since async methods are not
//! dyn-compatible. Both backends take the model per call so the client can
//! retry with a fallback model without building a second backend.
//!
//! The backend does not care which model answers; it sends a prompt and
//! returns the text of the reply, which should contain JSON.

use core::str::FromStr;
use core::time::Duration;

use ringside_core::config::LlmConfig;

use crate::error::RunnerError;
use crate::prompt::RenderedPrompt;

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions (`OpenAI`, Ollama, local proxies).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl FromStr for BackendType {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "ollama" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!("unknown LLM backend: {other}"))),
        }
    }
}

/// Connection settings shared by every call to one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmBackendConfig {
    /// Which API dialect to speak.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key; `None` for local proxies.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Response token cap.
    pub max_tokens: u32,
}

impl TryFrom<&LlmConfig> for LlmBackendConfig {
    type Error = RunnerError;

    fn try_from(config: &LlmConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            backend_type: config.backend.parse()?,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

/// An LLM backend that can process a prompt and return a response.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt to `model` and return the response text.
    ///
    /// `timeout` bounds the HTTP exchange.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        model: &str,
        timeout: Duration,
    ) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt, model, timeout).await,
            Self::Anthropic(backend) => backend.complete(prompt, model, timeout).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`. The `Authorization`
/// header is omitted when no key is configured, which is what local
/// proxies such as Ollama expect.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    fn request_body(&self, prompt: &RenderedPrompt, model: &str) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": {"type": "json_object"},
            "stream": false
        })
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        model: &str,
        timeout: Duration,
    ) -> Result<String, RunnerError> {
        let url = format!("{}/chat/completions", self.config.api_url);
        let mut request = self
            .client
            .post(&url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, model));
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(classify_failure("OpenAI", status, &error_body, model));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Differs from `OpenAI` in three ways: the key goes in `x-api-key`, the
/// system prompt is a top-level field, and the reply is at
/// `content[0].text`.
pub struct AnthropicBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    fn request_body(&self, prompt: &RenderedPrompt, model: &str) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        })
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        model: &str,
        timeout: Duration,
    ) -> Result<String, RunnerError> {
        let url = format!("{}/messages", self.config.api_url);
        let key = self.config.api_key.as_deref().unwrap_or_default();

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, model))
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(classify_failure("Anthropic", status, &error_body, model));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            RunnerError::LlmBackend(format!("Anthropic response parse failed: {e}"))
        })?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, RunnerError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend("Anthropic response missing content[0].text".to_owned())
        })
}

/// Turn a non-success HTTP reply into an error, singling out unknown models
/// so the caller can retry with its fallback model.
fn classify_failure(
    api: &str,
    status: reqwest::StatusCode,
    body: &str,
    model: &str,
) -> RunnerError {
    if status == reqwest::StatusCode::NOT_FOUND || body.contains("model_not_found") {
        return RunnerError::ModelNotFound {
            model: model.to_owned(),
        };
    }
    RunnerError::LlmBackend(format!("{api} returned {status}: {body}"))
}
