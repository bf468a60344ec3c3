//! Decision clients and fixtures for tests.
//!
//! Compiled only for this crate's tests or with the `testing` feature.
//!
//! [`ScriptedDecisionClient`] plays back per-agent scripts: answer, fail,
//! hang, or answer late. When an agent's script runs out the client falls
//! back to a per-role script, then to a failure.

use core::time::Duration;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use ringside_types::{AgentActionResponse, AgentId, EventContext, PromoterHints, Role};

use crate::config::BoundsConfig;
use crate::context::ContextBuilder;
use crate::decision::{DecisionClient, DecisionError};
use crate::roster::AgentProfile;
use crate::rulebook::{MatchFlags, RuleBook};
use crate::state::GameState;

/// One scripted reaction to a decision call.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Answer immediately.
    Respond(AgentActionResponse),
    /// Fail immediately with a service error.
    Fail(String),
    /// Never answer.
    Hang,
    /// Answer after a delay.
    Delay(Duration, AgentActionResponse),
}

/// A decision client driven by scripts.
#[derive(Debug, Default)]
pub struct ScriptedDecisionClient {
    scripts: Mutex<BTreeMap<AgentId, VecDeque<Script>>>,
    role_defaults: Mutex<BTreeMap<Role, Script>>,
    calls: Mutex<BTreeMap<AgentId, u32>>,
}

impl ScriptedDecisionClient {
    /// A client with no scripts; every call fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for one agent's next call.
    pub fn push(&self, agent_id: AgentId, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(agent_id)
            .or_default()
            .push_back(script);
    }

    /// Script used for every call by an agent of `role` whose own queue is
    /// empty.
    pub fn set_role_default(&self, role: Role, script: Script) {
        self.role_defaults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role, script);
    }

    /// Calls made for one agent so far.
    pub fn calls(&self, agent_id: AgentId) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&agent_id)
            .copied()
            .unwrap_or(0)
    }

    /// Calls made across all agents.
    pub fn total_calls(&self) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .fold(0, |acc, n| acc.saturating_add(*n))
    }

    fn next(&self, context: &EventContext) -> Script {
        let agent_id = context.requesting_agent_id;
        {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let n = calls.entry(agent_id).or_insert(0);
            *n = n.saturating_add(1);
        }
        let queued = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&agent_id)
            .and_then(VecDeque::pop_front);
        queued
            .or_else(|| {
                self.role_defaults
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&context.role)
                    .cloned()
            })
            .unwrap_or_else(|| Script::Fail(format!("no script for agent {agent_id}")))
    }
}

impl DecisionClient for ScriptedDecisionClient {
    async fn decide(
        &self,
        context: &EventContext,
        _timeout: Duration,
    ) -> Result<AgentActionResponse, DecisionError> {
        match self.next(context) {
            Script::Respond(response) => Ok(response),
            Script::Fail(message) => Err(DecisionError::service(message)),
            Script::Hang => futures::future::pending().await,
            Script::Delay(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }
}

/// A context for a fresh agent of `role` at the opening state, with the
/// real menu for that role.
pub fn sample_context(role: Role) -> EventContext {
    let snapshot = GameState::new(&BoundsConfig::default()).snapshot();
    let builder = ContextBuilder::new(RuleBook::new(), "StandardMatch");
    EventContext {
        requesting_agent_id: AgentId::new(),
        agent_name: format!("Sample {role}"),
        persona: String::new(),
        role,
        available_actions: RuleBook::new().available_actions(role, MatchFlags::from(&snapshot)),
        match_context: builder.match_context(&snapshot, None),
        state_snapshot: snapshot,
        promoter_hints: PromoterHints::new(),
    }
}

/// A profile created `seconds` after the epoch, for stable roster order.
pub fn profile_at(name: &str, role: &str, seconds: i64) -> AgentProfile {
    let created_at = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH
        .checked_add_signed(chrono::TimeDelta::seconds(seconds))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
    AgentProfile {
        created_at,
        ..AgentProfile::new(name, role)
    }
}
