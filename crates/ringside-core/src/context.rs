//! Per-agent decision context assembly.
//!
//! Given the same snapshot, agent, match context and hints, [`ContextBuilder`]
//! always produces the same [`EventContext`]. The menu comes from the
//! rulebook and depends only on role and match state.

use ringside_types::{AgentId, EventContext, MatchContext, PromoterHints, Role, StateSnapshot};

use crate::roster::Agent;
use crate::rulebook::{MatchFlags, RuleBook};

/// How the scheduler advances; reported in every match context.
pub const TICK_MODE: &str = "tick";

/// A context could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The role has nothing it could do in the current state.
    #[error("no actions available for {role} agent {agent_id}")]
    NoActions {
        /// The role.
        role: Role,
        /// The agent the context was for.
        agent_id: AgentId,
    },

    /// The agent was asked to act in a role it does not hold.
    #[error("agent {agent_id} is a {actual}, not a {requested}")]
    RoleMismatch {
        /// The agent.
        agent_id: AgentId,
        /// The role it was asked to act in.
        requested: Role,
        /// The role it holds.
        actual: Role,
    },
}

/// Builds immutable decision contexts.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    rulebook: RuleBook,
    stipulation: String,
}

impl ContextBuilder {
    /// Create a builder reporting `stipulation` in every match context.
    pub fn new(rulebook: RuleBook, stipulation: impl Into<String>) -> Self {
        Self {
            rulebook,
            stipulation: stipulation.into(),
        }
    }

    /// Match details as seen by one agent.
    pub fn match_context(
        &self,
        snapshot: &StateSnapshot,
        opponent: Option<AgentId>,
    ) -> MatchContext {
        MatchContext {
            phase: snapshot.phase,
            stipulation: self.stipulation.clone(),
            opponent_id: opponent,
            segment: snapshot.current_tick,
            mode: TICK_MODE.to_owned(),
            finish_pending: snapshot.finish_pending,
            warnings: snapshot.warnings,
        }
    }

    /// Assemble the context for `agent` acting as `role`.
    pub fn build(
        &self,
        snapshot: &StateSnapshot,
        role: Role,
        agent: &Agent,
        match_context: MatchContext,
        hints: &PromoterHints,
    ) -> Result<EventContext, ContextError> {
        if agent.role != role {
            return Err(ContextError::RoleMismatch {
                agent_id: agent.id,
                requested: role,
                actual: agent.role,
            });
        }
        let available_actions = self
            .rulebook
            .available_actions(role, MatchFlags::from(snapshot));
        if available_actions.is_empty() {
            return Err(ContextError::NoActions {
                role,
                agent_id: agent.id,
            });
        }
        Ok(EventContext {
            requesting_agent_id: agent.id,
            agent_name: agent.name.clone(),
            persona: agent.persona_hint(),
            role,
            available_actions,
            state_snapshot: snapshot.clone(),
            match_context,
            promoter_hints: hints.clone(),
        })
    }
}
