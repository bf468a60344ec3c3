//! Action menus, raw responses and applied actions.
//!
//! The lifecycle of one agent decision runs through three types:
//!
//! 1. [`PossibleAction`] -- an entry on the menu offered in the context.
//! 2. [`AgentActionResponse`] -- the untrusted choice that comes back.
//! 3. [`AppliedAction`] -- the validated result; the only thing allowed to
//!    change game state. A rejected response still produces an
//!    `AppliedAction`, but with an empty delta and a [`Rejection`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::{MatchSignals, PromoterHints, SegmentSignals};
use crate::enums::{DecisionSource, MatchPhase, Rejection, Role};
use crate::ids::{AgentId, FeudId};

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

/// The accepted shape of an action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// A whole number within an inclusive range.
    Integer {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// Free text; must not be blank.
    Text,
    /// A JSON object.
    Object,
    /// The id of a wrestler known to the game state.
    WrestlerRef,
    /// The id of a feud known to the game state.
    FeudRef,
}

/// One parameter of a [`PossibleAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Key in the response's `parameters` object.
    pub name: String,
    /// Accepted shape.
    pub kind: ParamKind,
    /// Whether the response must include it.
    pub required: bool,
    /// What the parameter means.
    pub description: String,
}

/// An entry on the menu offered to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleAction {
    /// Action name; the response must echo it exactly.
    pub name: String,
    /// What the action does.
    pub description: String,
    /// Parameter constraints.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The raw choice returned by the decision service. Untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActionResponse {
    /// Name of the chosen action.
    pub chosen_action: String,
    /// Action parameters.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// Why the agent chose it. Logged, never interpreted.
    #[serde(default)]
    pub rationale: Option<String>,
}

impl AgentActionResponse {
    /// A response choosing `action` with no parameters.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            chosen_action: action.into(),
            parameters: serde_json::Map::new(),
            rationale: None,
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Attach a rationale.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// What an applied action did, in narrative terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// The promoter issued new guidance.
    Hint {
        /// Keys merged into the promoter hints.
        new_hints: PromoterHints,
    },
    /// The promoter cut a promo.
    Promo {
        /// What the promo was about.
        topic: String,
    },
    /// An in-ring move.
    Move {
        /// Move name.
        name: String,
        /// Who the move was aimed at.
        target: Option<AgentId>,
        /// How hard it was thrown (1-10).
        intensity: u8,
    },
    /// A referee call.
    Call {
        /// The call made.
        call: String,
        /// Who the call concerns.
        target: Option<AgentId>,
    },
    /// A crowd reaction.
    Reaction {
        /// The reaction.
        reaction: String,
        /// Requested heat change.
        heat_adjustment: i64,
    },
    /// Announce desk commentary.
    Commentary {
        /// The call on the mic.
        text: String,
    },
    /// Something that happened backstage.
    Backstage {
        /// The backstage action.
        action: String,
    },
    /// Nothing happened (rejections and holding actions).
    NoOp,
}

/// A crowd member's heat contribution, aggregated once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdDelta {
    /// Change to overall heat.
    pub heat: i64,
    /// Wrestler the reaction was aimed at.
    pub wrestler: Option<AgentId>,
    /// Feud the reaction was aimed at.
    pub feud: Option<FeudId>,
}

/// The state change carried by an applied action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Direct change to overall heat.
    pub heat: i64,
    /// Direct change to overall momentum.
    pub momentum: i64,
    /// Reset overall momentum to the lower bound before applying `momentum`.
    pub reset_momentum: bool,
    /// Per-wrestler momentum changes.
    pub wrestler_momentum: BTreeMap<AgentId, i64>,
    /// Crowd heat, held back and folded once after the crowd role.
    pub crowd: Option<CrowdDelta>,
    /// New match phase.
    pub phase: Option<MatchPhase>,
    /// New value for the finish-pending flag.
    pub finish_pending: Option<bool>,
    /// Referee warnings to add.
    pub warnings: u32,
    /// Promoter hints to merge.
    pub hints: PromoterHints,
    /// In-ring signals to queue for the crowd.
    pub match_signals: MatchSignals,
    /// Segment signals to queue for the crowd.
    pub segment_signals: SegmentSignals,
}

impl StateDelta {
    /// Whether applying this delta would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The validated, effect-bearing result of one agent's turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAction {
    /// Who acted.
    pub agent_id: AgentId,
    /// In which role.
    pub role: Role,
    /// The action name as chosen.
    pub action: String,
    /// Narrative effect.
    pub effect: Effect,
    /// State change; empty when rejected.
    pub state_delta: StateDelta,
    /// Where the choice came from.
    pub source: DecisionSource,
    /// Set when the rulebook refused the choice.
    pub rejection: Option<Rejection>,
    /// Recovered failures on the way to this choice (timeouts, service
    /// errors, degradation).
    #[serde(default)]
    pub failures: Vec<String>,
    /// The agent's stated reasoning, if any.
    #[serde(default)]
    pub rationale: Option<String>,
}

impl AppliedAction {
    /// A no-op entry recording a rejected response.
    pub fn rejected(
        agent_id: AgentId,
        role: Role,
        response: &AgentActionResponse,
        source: DecisionSource,
        rejection: Rejection,
    ) -> Self {
        Self {
            agent_id,
            role,
            action: response.chosen_action.clone(),
            effect: Effect::NoOp,
            state_delta: StateDelta::default(),
            source,
            rejection: Some(rejection),
            failures: Vec::new(),
            rationale: response.rationale.clone(),
        }
    }

    /// Whether the action passed validation.
    pub const fn is_applied(&self) -> bool {
        self.rejection.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::RejectionReason;

    #[test]
    fn response_deserializes_with_missing_optional_fields() {
        let raw = r#"{"chosen_action": "grapple"}"#;
        let parsed: Result<AgentActionResponse, _> = serde_json::from_str(raw);
        assert_eq!(parsed.ok(), Some(AgentActionResponse::new("grapple")));
    }

    #[test]
    fn rejected_entry_carries_no_delta() {
        let response = AgentActionResponse::new("moonsault").with_rationale("why not");
        let entry = AppliedAction::rejected(
            AgentId::new(),
            Role::Participant,
            &response,
            DecisionSource::Service,
            Rejection::new(RejectionReason::NotOffered, "moonsault was not offered"),
        );
        assert!(!entry.is_applied());
        assert!(entry.state_delta.is_empty());
        assert_eq!(entry.effect, Effect::NoOp);
        assert_eq!(entry.rationale.as_deref(), Some("why not"));
    }

    #[test]
    fn param_kind_serializes_tagged() {
        let json = serde_json::to_value(ParamKind::Integer { min: -10, max: 10 }).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({"type": "integer", "min": -10, "max": 10}))
        );
    }
}
