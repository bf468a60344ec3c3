//! LLM-backed decision client for the Ringside show simulation.
//!
//! # Architecture
//!
//! ```text
//! EventContext --> Prompt Engine --> LLM Backend --> Parser --> AgentActionResponse
//! ```
//!
//! The scheduler owns deadlines, retries and fallbacks; this crate only
//! turns one context into one response or an error.
//!
//! # Modules
//!
//! - [`client`] -- [`LlmDecisionClient`], the `DecisionClient` implementation.
//! - [`llm`] -- `OpenAI`-compatible and Anthropic HTTP backends.
//! - [`prompt`] -- `minijinja` prompt rendering.
//! - [`parse`] -- Recovery of a response from model output.
//! - [`error`] -- [`RunnerError`].
//!
//! [`LlmDecisionClient`]: client::LlmDecisionClient
//! [`RunnerError`]: error::RunnerError

pub mod client;
pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;
