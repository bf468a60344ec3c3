//! Tick scheduler: one pass of every role through the decision pipeline.
//!
//! Each tick runs the roles in their fixed order. For every role:
//!
//! 1. **Build** -- one [`EventContext`] per agent, all from the same
//!    role-start snapshot.
//! 2. **Dispatch** -- ask the decision service for each agent under a hard
//!    deadline (concurrently or one by one; the outcome is the same).
//!    Degraded agents are not asked.
//! 3. **Fall back** -- agents without a usable answer get a seeded uniform
//!    choice from their menu.
//! 4. **Validate and fold** -- in stable agent order, run each response
//!    through the rulebook and fold the resulting delta into state.
//!
//! After the crowd role, the crowd's reactions are summed and folded into
//! heat once, together with the queued match and segment signals.
//!
//! The tick runs on a working copy of the state and only replaces the real
//! state when it completes, so a fatal error leaves the state untouched.

use chrono::Utc;
use futures::future::join_all;
use ringside_types::{
    AgentActionResponse, AppliedAction, DecisionSource, EngineRequest, EventContext, HeatUpdate,
    RequestId, RequestRecord, RequestStatus, Role, TickId, TickResult,
};
use tracing::{debug, info, warn};

use crate::context::{ContextBuilder, ContextError};
use crate::decision::{DecisionClient, DecisionOutcome, Dispatched, RetryPolicy, dispatch};
use crate::fallback::{AgentHealth, FallbackPolicy};
use crate::heat::CrowdAggregate;
use crate::pending::PendingQueue;
use crate::roster::Roster;
use crate::rulebook::RuleBook;
use crate::state::{GameState, StateError};

/// Errors that abort a tick. The state is left as it was before the tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A context could not be built.
    #[error("context error: {source}")]
    Context {
        /// The underlying context error.
        #[from]
        source: ContextError,
    },

    /// A fold broke a state invariant.
    #[error("state invariant violated: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },
}

/// Everything a completed tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// The tick's record.
    pub result: TickResult,
    /// How every decision call in the tick resolved.
    pub requests: Vec<RequestRecord>,
}

/// A decision, however it was reached, ready to validate.
struct Resolved {
    response: Option<AgentActionResponse>,
    source: DecisionSource,
    failures: Vec<String>,
}

/// Runs ticks. Holds only configuration; all mutable state is passed in.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    rulebook: RuleBook,
    contexts: ContextBuilder,
    fallback: FallbackPolicy,
    retry: RetryPolicy,
    concurrent: bool,
}

impl TickScheduler {
    /// Create a scheduler.
    pub const fn new(
        rulebook: RuleBook,
        contexts: ContextBuilder,
        fallback: FallbackPolicy,
        retry: RetryPolicy,
        concurrent: bool,
    ) -> Self {
        Self {
            rulebook,
            contexts,
            fallback,
            retry,
            concurrent,
        }
    }

    /// Execute one complete tick.
    pub async fn run_tick<D: DecisionClient>(
        &self,
        state: &mut GameState,
        health: &mut AgentHealth,
        roster: &Roster,
        client: &D,
        pending: &PendingQueue,
    ) -> Result<TickOutput, TickError> {
        let mut working = state.clone();
        let mut working_health = health.clone();
        let tick = working.advance_tick()?;
        info!(tick, agents = roster.len(), "Tick started");

        for agent in roster.agents(Role::Participant) {
            if working.ensure_wrestler(agent.id, &agent.name) {
                debug!(tick, agent_id = %agent.id, name = %agent.name, "wrestler record created");
            }
        }

        let mut applied_actions = Vec::new();
        let mut requests = Vec::new();
        let mut heat_update = None;

        for role in Role::ORDER {
            let agents = roster.agents(role);
            if agents.is_empty() {
                debug!(tick, role = %role, "no agents, role skipped");
                continue;
            }

            let snapshot = working.snapshot();
            let mut contexts = Vec::with_capacity(agents.len());
            for (index, agent) in agents.iter().enumerate() {
                let opponent = if role == Role::Participant {
                    roster.opponent_of(index)
                } else {
                    None
                };
                let match_context = self.contexts.match_context(&snapshot, opponent);
                contexts.push(self.contexts.build(
                    &snapshot,
                    role,
                    agent,
                    match_context,
                    &working.hints,
                )?);
            }

            let resolved = self
                .resolve_role(
                    tick,
                    &contexts,
                    &mut working_health,
                    client,
                    pending,
                    &mut requests,
                )
                .await;

            let mut crowd = CrowdAggregate::default();
            for (context, decision) in contexts.iter().zip(resolved) {
                let entry = self.fold(context, decision, &mut working, &mut crowd)?;
                applied_actions.push(entry);
            }

            if role == Role::Crowd {
                let update = working.apply_crowd(&crowd);
                working.check_invariants()?;
                log_heat_update(tick, &update);
                heat_update = Some(update);
            }
        }

        let result = TickResult {
            tick_id: TickId::new(),
            time_index: tick,
            applied_actions,
            state_snapshot: working.snapshot(),
            heat_update,
        };
        info!(
            tick,
            actions = result.applied_actions.len(),
            rejected = result.rejected().count(),
            heat = working.heat,
            momentum = working.momentum,
            phase = ?working.phase,
            "Tick completed"
        );

        *state = working;
        *health = working_health;
        Ok(TickOutput { result, requests })
    }

    /// Get a decision for every agent of one role, in agent order.
    async fn resolve_role<D: DecisionClient>(
        &self,
        tick: u64,
        contexts: &[EventContext],
        health: &mut AgentHealth,
        client: &D,
        pending: &PendingQueue,
        records: &mut Vec<RequestRecord>,
    ) -> Vec<Resolved> {
        // Degradation is read before any call of the role goes out and
        // updated after all of them come back, in agent order.
        let asked: Vec<bool> = contexts
            .iter()
            .map(|ctx| !health.is_degraded(ctx.requesting_agent_id))
            .collect();

        let calls = contexts
            .iter()
            .zip(&asked)
            .filter(|(_, ask)| **ask)
            .map(|(ctx, _)| self.call(tick, ctx, client, pending));
        let answers: Vec<(RequestId, Dispatched)> = if self.concurrent {
            join_all(calls).await
        } else {
            let mut out = Vec::with_capacity(contexts.len());
            for call in calls {
                out.push(call.await);
            }
            out
        };
        let mut answers = answers.into_iter();

        let mut resolved = Vec::with_capacity(contexts.len());
        for (ctx, ask) in contexts.iter().zip(asked) {
            let agent_id = ctx.requesting_agent_id;
            if !ask {
                let failures = vec![format!(
                    "agent {agent_id} is degraded; decision service skipped"
                )];
                records.push(RequestRecord {
                    request_id: RequestId::new(),
                    agent_id,
                    due_tick: tick,
                    attempts: 0,
                    source: DecisionSource::Degraded,
                    failures: failures.clone(),
                });
                resolved.push(Resolved {
                    response: self.fallback.choose(&self.rulebook, ctx, tick),
                    source: DecisionSource::Degraded,
                    failures,
                });
                continue;
            }

            let Some((request_id, dispatched)) = answers.next() else {
                continue;
            };
            let Dispatched {
                outcome,
                attempts,
                failures,
            } = dispatched;
            let (response, source) = match outcome {
                DecisionOutcome::Success(response) => {
                    health.record_success(agent_id);
                    (Some(response), DecisionSource::Service)
                }
                DecisionOutcome::Timeout | DecisionOutcome::ServiceError(_) => {
                    let failed = u32::try_from(failures.len()).unwrap_or(u32::MAX);
                    health.record_failures(agent_id, failed);
                    warn!(
                        tick,
                        agent_id = %agent_id,
                        attempts,
                        outcome = ?outcome,
                        "decision unavailable, using fallback"
                    );
                    (
                        self.fallback.choose(&self.rulebook, ctx, tick),
                        DecisionSource::Fallback,
                    )
                }
            };
            records.push(RequestRecord {
                request_id,
                agent_id,
                due_tick: tick,
                attempts,
                source,
                failures: failures.clone(),
            });
            resolved.push(Resolved {
                response,
                source,
                failures,
            });
        }
        resolved
    }

    /// Issue one tracked decision call and stop tracking it once resolved.
    async fn call<D: DecisionClient>(
        &self,
        tick: u64,
        context: &EventContext,
        client: &D,
        pending: &PendingQueue,
    ) -> (RequestId, Dispatched) {
        let request_id = RequestId::new();
        pending.insert(EngineRequest {
            request_id,
            agent_id: context.requesting_agent_id,
            due_tick: tick,
            context: context.clone(),
            attempts: 0,
            status: RequestStatus::InFlight,
            issued_at: Utc::now(),
        });
        let dispatched = dispatch(client, context, self.retry, pending, request_id).await;
        pending.remove(request_id);
        (request_id, dispatched)
    }

    /// Validate one decision and fold it into the working state.
    fn fold(
        &self,
        context: &EventContext,
        decision: Resolved,
        state: &mut GameState,
        crowd: &mut CrowdAggregate,
    ) -> Result<AppliedAction, TickError> {
        let agent_id = context.requesting_agent_id;
        let Some(response) = decision.response else {
            return Err(ContextError::NoActions {
                role: context.role,
                agent_id,
            }
            .into());
        };

        match self.rulebook.validate(&response, context, state) {
            Ok(ruling) => {
                if let Some(delta) = &ruling.delta.crowd {
                    crowd.add(delta);
                }
                state.apply(&ruling.delta);
                state.check_invariants()?;
                debug!(
                    agent_id = %agent_id,
                    role = %context.role,
                    action = %response.chosen_action,
                    source = ?decision.source,
                    "action applied"
                );
                Ok(AppliedAction {
                    agent_id,
                    role: context.role,
                    action: response.chosen_action,
                    effect: ruling.effect,
                    state_delta: ruling.delta,
                    source: decision.source,
                    rejection: None,
                    failures: decision.failures,
                    rationale: response.rationale,
                })
            }
            Err(rejection) => {
                warn!(
                    agent_id = %agent_id,
                    role = %context.role,
                    action = %response.chosen_action,
                    reason = %rejection,
                    "action rejected"
                );
                let mut entry = AppliedAction::rejected(
                    agent_id,
                    context.role,
                    &response,
                    decision.source,
                    rejection,
                );
                entry.failures = decision.failures;
                Ok(entry)
            }
        }
    }
}

fn log_heat_update(tick: u64, update: &HeatUpdate) {
    info!(
        tick,
        reactions = update.reactions,
        crowd_sum = update.crowd_sum,
        match_heat = update.match_heat,
        segment_heat = update.segment_heat,
        before = update.before,
        after = update.after,
        "Crowd heat folded"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use core::time::Duration;

    use ringside_types::{Effect, MatchPhase, RejectionReason};

    use super::*;
    use crate::config::{BoundsConfig, ShowConfig};
    use crate::roster::AgentProfile;
    use crate::testing::{Script, ScriptedDecisionClient, profile_at};

    fn scheduler(concurrent: bool) -> TickScheduler {
        TickScheduler::new(
            RuleBook::new(),
            ContextBuilder::new(RuleBook::new(), "StandardMatch"),
            FallbackPolicy::new(42),
            RetryPolicy {
                timeout: Duration::from_millis(100),
                max_attempts: 2,
            },
            concurrent,
        )
    }

    struct Fixture {
        state: GameState,
        health: AgentHealth,
        pending: PendingQueue,
    }

    fn fixture() -> Fixture {
        let config = ShowConfig::default();
        Fixture {
            state: GameState::new(&BoundsConfig::default()),
            health: AgentHealth::new(config.decision.degrade_after_failures),
            pending: PendingQueue::new(),
        }
    }

    #[tokio::test]
    async fn empty_roster_still_advances_the_tick() {
        let mut f = fixture();
        let out = scheduler(true)
            .run_tick(
                &mut f.state,
                &mut f.health,
                &Roster::default(),
                &ScriptedDecisionClient::new(),
                &f.pending,
            )
            .await
            .unwrap();
        assert_eq!(out.result.time_index, 1);
        assert!(out.result.applied_actions.is_empty());
        assert!(out.result.heat_update.is_none());
        assert_eq!(f.state.current_tick, 1);
    }

    #[tokio::test]
    async fn participant_and_crowd_scenario() {
        let mut f = fixture();
        let rex = profile_at("Rex", "participant", 1);
        let fans = profile_at("Fans", "crowd", 2);
        let client = ScriptedDecisionClient::new();
        client.push(rex.id, Script::Respond(AgentActionResponse::new("grapple")));
        client.push(
            fans.id,
            Script::Respond(AgentActionResponse::new("cheer").with_param("heat_adjustment", 7)),
        );
        let roster = Roster::build(vec![fans, rex]).unwrap();

        let out = scheduler(true)
            .run_tick(&mut f.state, &mut f.health, &roster, &client, &f.pending)
            .await
            .unwrap();

        assert_eq!(f.state.heat, 57);
        assert_eq!(f.state.phase, MatchPhase::InProgress);
        let roles: Vec<Role> = out.result.applied_actions.iter().map(|a| a.role).collect();
        assert_eq!(roles, vec![Role::Participant, Role::Crowd]);
        assert!(matches!(
            out.result.applied_actions.first().map(|a| &a.effect),
            Some(Effect::Move { .. })
        ));
        let update = out.result.heat_update.unwrap();
        assert_eq!(update.crowd_sum, 7);
        assert_eq!(update.after, 57);
        assert!(f.pending.is_empty());
    }

    #[tokio::test]
    async fn unoffered_action_is_recorded_and_does_not_mutate() {
        let mut f = fixture();
        let promoter = profile_at("Vince", "promoter", 1);
        let client = ScriptedDecisionClient::new();
        client.push(promoter.id, Script::Respond(AgentActionResponse::new("finisher")));
        let roster = Roster::build(vec![promoter]).unwrap();
        let before = f.state.snapshot();

        let out = scheduler(true)
            .run_tick(&mut f.state, &mut f.health, &roster, &client, &f.pending)
            .await
            .unwrap();

        let entry = out.result.applied_actions.first().unwrap();
        assert_eq!(
            entry.rejection.as_ref().map(|r| r.reason),
            Some(RejectionReason::UnknownAction)
        );
        assert_eq!(f.state.heat, before.heat);
        assert_eq!(f.state.momentum, before.momentum);
        assert_eq!(f.state.phase, before.phase);
    }

    #[tokio::test]
    async fn failed_agent_gets_a_fallback_entry() {
        let mut f = fixture();
        let referee = profile_at("Ref", "referee", 1);
        let referee_id = referee.id;
        let roster = Roster::build(vec![referee]).unwrap();

        let out = scheduler(true)
            .run_tick(
                &mut f.state,
                &mut f.health,
                &roster,
                &ScriptedDecisionClient::new(),
                &f.pending,
            )
            .await
            .unwrap();

        let entry = out.result.applied_actions.first().unwrap();
        assert_eq!(entry.source, DecisionSource::Fallback);
        assert!(entry.is_applied());
        assert_eq!(entry.failures.len(), 2);
        assert!(["check_gear", "warn"].contains(&entry.action.as_str()));
        assert_eq!(f.health.consecutive_failures(referee_id), 2);
        let record = out.requests.first().unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.source, DecisionSource::Fallback);
    }

    #[tokio::test]
    async fn degraded_agent_is_not_called() {
        let mut f = fixture();
        let fans = profile_at("Fans", "crowd", 1);
        let fans_id = fans.id;
        let roster = Roster::build(vec![fans]).unwrap();
        let client = ScriptedDecisionClient::new();
        let s = scheduler(false);

        // Two failed attempts per tick; the threshold of three is crossed
        // during the second tick.
        for _ in 0..2 {
            s.run_tick(&mut f.state, &mut f.health, &roster, &client, &f.pending)
                .await
                .unwrap();
        }
        assert!(f.health.is_degraded(fans_id));
        let calls_before = client.calls(fans_id);

        let out = s
            .run_tick(&mut f.state, &mut f.health, &roster, &client, &f.pending)
            .await
            .unwrap();
        assert_eq!(client.calls(fans_id), calls_before);
        let entry = out.result.applied_actions.first().unwrap();
        assert_eq!(entry.source, DecisionSource::Degraded);
        assert!(entry.is_applied());
    }

    #[tokio::test]
    async fn state_error_leaves_state_untouched() {
        let mut f = fixture();
        f.state.current_tick = u64::MAX;
        let before = f.state.clone();
        let err = scheduler(true)
            .run_tick(
                &mut f.state,
                &mut f.health,
                &Roster::default(),
                &ScriptedDecisionClient::new(),
                &f.pending,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TickError::State { .. }));
        assert_eq!(f.state, before);
    }

    #[tokio::test]
    async fn new_participants_get_wrestler_records() {
        let mut f = fixture();
        let rex = AgentProfile::new("Rex", "participant");
        let rex_id = rex.id;
        let roster = Roster::build(vec![rex]).unwrap();
        scheduler(true)
            .run_tick(
                &mut f.state,
                &mut f.health,
                &roster,
                &ScriptedDecisionClient::new(),
                &f.pending,
            )
            .await
            .unwrap();
        assert_eq!(
            f.state.wrestlers.get(&rex_id).map(|w| w.name.as_str()),
            Some("Rex")
        );
    }
}
