//! Shared type definitions for the Ringside show simulation.
//!
//! This crate is the single source of truth for the values that cross
//! component boundaries: what the scheduler hands the decision service,
//! what comes back, and what the engine emits to the result sink.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for agents, feuds, ticks and requests
//! - [`enums`] -- Roles (with their fixed processing order), match phase,
//!   rejection reasons and decision sources
//! - [`actions`] -- Action menus, raw responses and applied actions
//! - [`context`] -- State snapshots and the per-agent decision context
//! - [`results`] -- Tick results and engine request records

pub mod actions;
pub mod context;
pub mod enums;
pub mod ids;
pub mod results;

// Re-export all public types at crate root for convenience.
pub use actions::{
    AgentActionResponse, AppliedAction, CrowdDelta, Effect, ParamKind, ParameterSpec,
    PossibleAction, StateDelta,
};
pub use context::{
    EventContext, FeudRecord, MatchContext, MatchSignals, PromoterHints, SegmentSignals,
    StateSnapshot, WrestlerRecord,
};
pub use enums::{DecisionSource, MatchPhase, Rejection, RejectionReason, Role, UnknownRole};
pub use ids::{AgentId, FeudId, RequestId, TickId};
pub use results::{EngineRequest, HeatUpdate, RequestRecord, RequestStatus, TickResult};
