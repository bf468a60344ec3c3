//! Tick results and engine request records.
//!
//! A [`TickResult`] is the append-only record of one tick. An
//! [`EngineRequest`] lives only while its decision call is unresolved; once
//! resolved it is summarised as a [`RequestRecord`] for the result sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions::AppliedAction;
use crate::context::{EventContext, MatchSignals, SegmentSignals, StateSnapshot};
use crate::enums::DecisionSource;
use crate::ids::{AgentId, RequestId, TickId};

/// How the crowd moved overall heat this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatUpdate {
    /// Number of crowd reactions that were applied.
    pub reactions: u32,
    /// Sum of crowd heat adjustments.
    pub crowd_sum: i64,
    /// Contribution of queued in-ring signals.
    pub match_heat: i64,
    /// Contribution of queued segment signals.
    pub segment_heat: i64,
    /// Heat before the update.
    pub before: i64,
    /// Heat after the update (clamped).
    pub after: i64,
    /// The signals that were consumed.
    pub match_signals: MatchSignals,
    /// The segment signals that were consumed.
    pub segment_signals: SegmentSignals,
}

/// The complete, ordered record of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    /// Unique id of this tick.
    pub tick_id: TickId,
    /// The tick number (equal to `current_tick` after the tick).
    pub time_index: u64,
    /// One entry per agent turn, in role order then agent order.
    pub applied_actions: Vec<AppliedAction>,
    /// Game state at the end of the tick.
    pub state_snapshot: StateSnapshot,
    /// The crowd's heat update, absent when no crowd agent acted.
    pub heat_update: Option<HeatUpdate>,
}

impl TickResult {
    /// Entries that passed validation.
    pub fn applied(&self) -> impl Iterator<Item = &AppliedAction> {
        self.applied_actions.iter().filter(|a| a.is_applied())
    }

    /// Entries that were rejected.
    pub fn rejected(&self) -> impl Iterator<Item = &AppliedAction> {
        self.applied_actions.iter().filter(|a| !a.is_applied())
    }
}

/// Lifecycle of an unresolved decision call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting on the decision service.
    InFlight,
    /// The last attempt failed and another is about to be made.
    AwaitingRetry,
}

/// A decision call that has been issued but not yet resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    /// Unique id of the call.
    pub request_id: RequestId,
    /// The agent being asked.
    pub agent_id: AgentId,
    /// The tick the answer is due in.
    pub due_tick: u64,
    /// The full context sent.
    pub context: EventContext,
    /// Attempts started so far.
    pub attempts: u32,
    /// Current status.
    pub status: RequestStatus,
    /// When the call was first issued.
    pub issued_at: DateTime<Utc>,
}

/// How a decision call was resolved, for the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Id of the call.
    pub request_id: RequestId,
    /// The agent that was asked.
    pub agent_id: AgentId,
    /// The tick the call belonged to.
    pub due_tick: u64,
    /// Attempts made against the decision service.
    pub attempts: u32,
    /// How the choice was finally made.
    pub source: DecisionSource,
    /// One message per failed attempt.
    pub failures: Vec<String>,
}
