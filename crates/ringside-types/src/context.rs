//! State snapshots and the per-agent decision context.
//!
//! An [`EventContext`] is the complete, self-contained input to one decision
//! call. It is built once per agent per tick and never mutated afterwards;
//! everything the decision service may look at is in here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::PossibleAction;
use crate::enums::{MatchPhase, Role};
use crate::ids::{AgentId, FeudId};

/// Opaque promoter guidance, passed through to contexts uninterpreted.
pub type PromoterHints = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Heat signals
// ---------------------------------------------------------------------------

/// Significant in-ring events awaiting a crowd reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSignals {
    /// Flat heat contribution that bypasses the weight table.
    pub base: i64,
    /// Counts that did not end the match.
    pub near_falls: u32,
    /// High-risk maneuvers attempted.
    pub high_risk_moves: u32,
    /// Finishers hit.
    pub finishers: u32,
    /// Run-ins from backstage.
    pub interferences: u32,
}

impl MatchSignals {
    /// Add another set of signals into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.base = self.base.saturating_add(other.base);
        self.near_falls = self.near_falls.saturating_add(other.near_falls);
        self.high_risk_moves = self.high_risk_moves.saturating_add(other.high_risk_moves);
        self.finishers = self.finishers.saturating_add(other.finishers);
        self.interferences = self.interferences.saturating_add(other.interferences);
    }

    /// Whether no signal has been recorded.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Significant out-of-ring segment events awaiting a crowd reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSignals {
    /// Flat heat contribution that bypasses the weight table.
    pub base: i64,
    /// Promos cut by the promoter.
    pub promos: u32,
    /// Play-by-play calls from the announce desk.
    pub commentary: u32,
}

impl SegmentSignals {
    /// Add another set of signals into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.base = self.base.saturating_add(other.base);
        self.promos = self.promos.saturating_add(other.promos);
        self.commentary = self.commentary.saturating_add(other.commentary);
    }

    /// Whether no signal has been recorded.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Entity records
// ---------------------------------------------------------------------------

/// Running per-wrestler scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrestlerRecord {
    /// Ring name.
    pub name: String,
    /// The crowd's investment in this wrestler.
    pub heat: i64,
    /// This wrestler's advantage in the match.
    pub momentum: i64,
}

/// Running score of a rivalry between two wrestlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeudRecord {
    /// Display name of the feud.
    pub name: String,
    /// The two sides of the feud.
    pub wrestlers: Vec<AgentId>,
    /// The crowd's investment in the rivalry.
    pub heat: i64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable view of the game state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The tick this snapshot belongs to.
    pub current_tick: u64,
    /// Overall audience engagement.
    pub heat: i64,
    /// Overall match momentum.
    pub momentum: i64,
    /// Match lifecycle phase.
    pub phase: MatchPhase,
    /// Whether a finisher has landed and a decision can be called.
    pub finish_pending: bool,
    /// Referee warnings issued so far in the match.
    pub warnings: u32,
    /// Per-wrestler records.
    pub wrestlers: BTreeMap<AgentId, WrestlerRecord>,
    /// Per-feud records.
    pub feuds: BTreeMap<FeudId, FeudRecord>,
}

// ---------------------------------------------------------------------------
// Decision context
// ---------------------------------------------------------------------------

/// Match-level details for the acting agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchContext {
    /// Match lifecycle phase.
    pub phase: MatchPhase,
    /// Match rules (e.g. `StandardMatch`).
    pub stipulation: String,
    /// The wrestler across the ring, if the agent is a participant with one.
    pub opponent_id: Option<AgentId>,
    /// Current segment of the show; one segment per tick.
    pub segment: u64,
    /// How the engine is advancing (always `tick` for the scheduler).
    pub mode: String,
    /// Whether a decision can be called right now.
    pub finish_pending: bool,
    /// Referee warnings issued so far.
    pub warnings: u32,
}

/// Everything the decision service sees for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// The agent being asked to act.
    pub requesting_agent_id: AgentId,
    /// Display name of that agent.
    pub agent_name: String,
    /// Gimmick and persona hints for that agent.
    pub persona: String,
    /// The role the agent acts in.
    pub role: Role,
    /// The menu; any other choice is rejected.
    pub available_actions: Vec<PossibleAction>,
    /// Game state as of the start of the agent's role.
    pub state_snapshot: StateSnapshot,
    /// Match-level details.
    pub match_context: MatchContext,
    /// Promoter guidance in effect.
    pub promoter_hints: PromoterHints,
}

impl EventContext {
    /// Look up an offered action by name.
    pub fn offered(&self, name: &str) -> Option<&PossibleAction> {
        self.available_actions.iter().find(|a| a.name == name)
    }

    /// Names of all offered actions, in menu order.
    pub fn action_names(&self) -> Vec<&str> {
        self.available_actions.iter().map(|a| a.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_signals_merge_saturates() {
        let mut signals = MatchSignals {
            near_falls: u32::MAX,
            ..MatchSignals::default()
        };
        signals.merge(&MatchSignals {
            near_falls: 1,
            finishers: 2,
            ..MatchSignals::default()
        });
        assert_eq!(signals.near_falls, u32::MAX);
        assert_eq!(signals.finishers, 2);
        assert!(!signals.is_empty());
    }

    #[test]
    fn default_signals_are_empty() {
        assert!(MatchSignals::default().is_empty());
        assert!(SegmentSignals::default().is_empty());
    }
}
