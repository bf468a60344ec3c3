//! Tick scheduler, rulebook, heat model and engine for the Ringside show
//! simulation.
//!
//! Every tick walks the six roles in their fixed order (promoter,
//! participants, referee, crowd, announcer, backstage). Each agent is asked
//! for a decision under a deadline, the answer is validated against the
//! role's rulebook, and the resulting delta is folded into the game state.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `ringside-config.yaml` into
//!   strongly-typed structs.
//! - [`state`] -- The authoritative [`GameState`] with clamped bounds.
//! - [`heat`] -- Crowd aggregation and the match/segment heat model.
//! - [`rulebook`] -- Static per-role action tables and response validation.
//! - [`roster`] -- Agent directory, profiles and role grouping.
//! - [`context`] -- Per-agent [`EventContext`] assembly.
//! - [`decision`] -- [`DecisionClient`] trait and deadline-bounded dispatch.
//! - [`fallback`] -- Seeded fallback choices and agent degradation.
//! - [`pending`] -- Shared queue of in-flight decision calls.
//! - [`sink`] -- Result sinks for completed ticks.
//! - [`tick`] -- The per-tick role pipeline.
//! - [`engine`] -- [`Engine`] facade that runs ticks in sequence.
//! - `testing` -- Scripted decision clients for tests (behind the `testing` feature).
//!
//! [`GameState`]: state::GameState
//! [`EventContext`]: ringside_types::EventContext
//! [`DecisionClient`]: decision::DecisionClient
//! [`Engine`]: engine::Engine

pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod fallback;
pub mod heat;
pub mod pending;
pub mod roster;
pub mod rulebook;
pub mod sink;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tick;
