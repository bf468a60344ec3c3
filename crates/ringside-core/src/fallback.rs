//! Fallback choices and agent degradation.
//!
//! When the decision service does not produce a response, the agent still
//! acts: [`FallbackPolicy`] picks uniformly among the offered actions and
//! fills required parameters from the rulebook, so a fallback choice always
//! validates. The random stream is seeded from the show seed, the tick and
//! the agent id, so a rerun with the same seed and the same agent ids makes
//! the same choices no matter how calls interleave.
//!
//! [`AgentHealth`] counts consecutive failed attempts per agent. Once an
//! agent reaches the threshold it is degraded and the scheduler stops
//! calling the service for it for the rest of the run.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use ringside_types::{AgentActionResponse, AgentId, EventContext};
use tracing::warn;

use crate::rulebook::RuleBook;

/// Seeded uniform choice among offered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    seed: u64,
}

impl FallbackPolicy {
    /// A policy drawing from `seed`.
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn stream_seed(&self, tick: u64, agent_id: AgentId) -> u64 {
        let (high, low) = agent_id.into_inner().as_u64_pair();
        self.seed ^ tick.rotate_left(32) ^ high ^ low
    }

    /// Pick an action for the agent in `context` during `tick`.
    ///
    /// Returns `None` only when the menu is empty.
    pub fn choose(
        &self,
        rulebook: &RuleBook,
        context: &EventContext,
        tick: u64,
    ) -> Option<AgentActionResponse> {
        let actions = &context.available_actions;
        if actions.is_empty() {
            return None;
        }
        let mut rng = SmallRng::seed_from_u64(self.stream_seed(tick, context.requesting_agent_id));
        let idx = rng.random_range(0..actions.len());
        let action = actions.get(idx)?;
        let mut response = AgentActionResponse::new(action.name.clone())
            .with_rationale("fallback: uniform choice among offered actions");
        response.parameters = rulebook.default_parameters(context.role, &action.name);
        Some(response)
    }
}

/// Consecutive-failure tracking and degradation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentHealth {
    threshold: u32,
    failures: BTreeMap<AgentId, u32>,
    degraded: BTreeSet<AgentId>,
}

impl AgentHealth {
    /// Degrade agents after `threshold` consecutive failed attempts.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: BTreeMap::new(),
            degraded: BTreeSet::new(),
        }
    }

    /// Whether the agent has been degraded.
    pub fn is_degraded(&self, agent_id: AgentId) -> bool {
        self.degraded.contains(&agent_id)
    }

    /// Consecutive failures recorded for the agent.
    pub fn consecutive_failures(&self, agent_id: AgentId) -> u32 {
        self.failures.get(&agent_id).copied().unwrap_or(0)
    }

    /// Record `count` failed attempts. Returns `true` if this degraded the
    /// agent.
    pub fn record_failures(&mut self, agent_id: AgentId, count: u32) -> bool {
        if count == 0 || self.is_degraded(agent_id) {
            return false;
        }
        let total = self.failures.entry(agent_id).or_insert(0);
        *total = total.saturating_add(count);
        if *total >= self.threshold {
            warn!(
                agent_id = %agent_id,
                failures = *total,
                "agent degraded; decision service skipped for the rest of the run"
            );
            self.degraded.insert(agent_id);
            return true;
        }
        false
    }

    /// A successful call resets the consecutive count.
    pub fn record_success(&mut self, agent_id: AgentId) {
        self.failures.remove(&agent_id);
    }

    /// Every degraded agent.
    pub fn degraded(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.degraded.iter().copied()
    }
}
