//! The engine: owns the game state and runs ticks one after another.
//!
//! [`Engine::new`] does every check that can fail for configuration reasons
//! (config bounds, action tables, the roster, feud wiring) so that once it
//! returns, only state invariant violations can stop a run.

use std::collections::BTreeMap;

use ringside_types::{
    AgentId, EngineRequest, FeudId, FeudRecord, PromoterHints, Role, StateSnapshot, TickResult,
};
use tracing::{info, warn};

use crate::config::{ConfigError, ShowConfig};
use crate::context::ContextBuilder;
use crate::decision::{DecisionClient, RetryPolicy};
use crate::fallback::{AgentHealth, FallbackPolicy};
use crate::pending::PendingQueue;
use crate::roster::{AgentDirectory, Roster, RosterError};
use crate::rulebook::{RuleBook, RulebookError};
use crate::sink::ResultSink;
use crate::state::GameState;
use crate::tick::{TickError, TickScheduler};

/// Errors that stop the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration is unusable.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A static action table is malformed.
    #[error("rulebook error: {source}")]
    Rulebook {
        /// The underlying rulebook error.
        #[from]
        source: RulebookError,
    },

    /// The roster could not be built.
    #[error("roster error: {source}")]
    Roster {
        /// The underlying roster error.
        #[from]
        source: RosterError,
    },

    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Counts from [`Engine::run_to_sink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks completed.
    pub ticks: u64,
    /// Entries that changed the state.
    pub applied: usize,
    /// Entries recorded as rejections.
    pub rejected: usize,
}

/// Runs a show against a decision client.
pub struct Engine<D> {
    state: GameState,
    health: AgentHealth,
    scheduler: TickScheduler,
    client: D,
    directory: Box<dyn AgentDirectory + Send + Sync>,
    sink: Box<dyn ResultSink>,
    pending: PendingQueue,
}

impl<D: DecisionClient> Engine<D> {
    /// Validate everything and set up the opening state.
    pub fn new(
        config: &ShowConfig,
        client: D,
        directory: Box<dyn AgentDirectory + Send + Sync>,
        sink: Box<dyn ResultSink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let rulebook = RuleBook::new();
        rulebook.validate_tables()?;
        let roster = Roster::load(directory.as_ref())?;

        let mut state = GameState::new(&config.bounds);
        for agent in roster.agents(Role::Participant) {
            state.ensure_wrestler(agent.id, &agent.name);
        }
        seed_feuds(config, &roster, &mut state)?;
        state.check_invariants().map_err(TickError::from)?;

        let scheduler = TickScheduler::new(
            rulebook,
            ContextBuilder::new(rulebook, config.show.stipulation.clone()),
            FallbackPolicy::new(config.show.seed),
            RetryPolicy {
                timeout: core::time::Duration::from_millis(config.decision.timeout_ms),
                max_attempts: config.decision.max_attempts,
            },
            config.decision.concurrent_dispatch,
        );

        info!(
            show = %config.show.name,
            agents = roster.len(),
            feuds = state.feuds.len(),
            heat = state.heat,
            "Engine ready"
        );

        Ok(Self {
            state,
            health: AgentHealth::new(config.decision.degrade_after_failures),
            scheduler,
            client,
            directory,
            sink,
            pending: PendingQueue::new(),
        })
    }

    /// Run `n` ticks in sequence and return their results in order.
    ///
    /// Each result is handed to the sink as soon as its tick completes. Sink
    /// failures are logged and ignored. `n = 0` does nothing. Every result
    /// is also kept until the call returns; for long runs where the sink is
    /// the only consumer use [`Engine::run_to_sink`].
    pub async fn run_ticks(&mut self, n: u64) -> Result<Vec<TickResult>, EngineError> {
        let mut results = Vec::new();
        for _ in 0..n {
            results.push(self.step().await?);
        }
        Ok(results)
    }

    /// Run `n` ticks like [`Engine::run_ticks`], but drop each result once
    /// the sink has it and return only the counts.
    pub async fn run_to_sink(&mut self, n: u64) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        for _ in 0..n {
            let result = self.step().await?;
            summary.ticks = summary.ticks.saturating_add(1);
            summary.applied = summary.applied.saturating_add(result.applied().count());
            summary.rejected = summary.rejected.saturating_add(result.rejected().count());
        }
        Ok(summary)
    }

    async fn step(&mut self) -> Result<TickResult, EngineError> {
        let roster = Roster::load(self.directory.as_ref())?;
        let output = self
            .scheduler
            .run_tick(
                &mut self.state,
                &mut self.health,
                &roster,
                &self.client,
                &self.pending,
            )
            .await?;

        if let Err(e) = self.sink.record_requests(&output.requests) {
            warn!(
                tick = output.result.time_index,
                error = %e,
                "result sink failed to record requests"
            );
        }
        if let Err(e) = self.sink.record_tick(&output.result) {
            warn!(
                tick = output.result.time_index,
                error = %e,
                "result sink failed to record tick"
            );
        }
        Ok(output.result)
    }

    /// Merge promoter hints; they reach every context built from now on.
    pub fn set_hints(&mut self, hints: &PromoterHints) {
        self.state.merge_hints(hints);
    }

    /// A copy of every decision call still unresolved.
    pub fn pending_requests(&self) -> Vec<EngineRequest> {
        self.pending.snapshot()
    }

    /// A shared handle on the pending queue, readable while ticks run.
    pub fn pending_handle(&self) -> PendingQueue {
        self.pending.clone()
    }

    /// The current state.
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Immutable view of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Per-agent failure tracking.
    pub const fn health(&self) -> &AgentHealth {
        &self.health
    }
}

fn seed_feuds(
    config: &ShowConfig,
    roster: &Roster,
    state: &mut GameState,
) -> Result<(), ConfigError> {
    let by_name: BTreeMap<&str, AgentId> = roster
        .agents(Role::Participant)
        .iter()
        .map(|a| (a.name.as_str(), a.id))
        .collect();
    for feud in &config.feuds {
        let wrestlers = feud
            .wrestlers
            .iter()
            .map(|name| {
                by_name.get(name.as_str()).copied().ok_or_else(|| {
                    ConfigError::invalid(format!(
                        "feud `{}` names `{name}`, who is not a participant",
                        feud.name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        state.insert_feud(
            FeudId::new(),
            FeudRecord {
                name: feud.name.clone(),
                wrestlers,
                heat: feud.heat,
            },
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ringside_types::{AgentActionResponse, RequestRecord};

    use super::*;
    use crate::config::FeudEntry;
    use crate::roster::{AgentProfile, InMemoryDirectory};
    use crate::sink::{MemorySink, SinkError};
    use crate::testing::{Script, ScriptedDecisionClient};

    struct BrokenSink;

    impl ResultSink for BrokenSink {
        fn record_tick(&mut self, _result: &TickResult) -> Result<(), SinkError> {
            Err(SinkError::Rejected {
                message: "disk full".to_owned(),
            })
        }

        fn record_requests(&mut self, _records: &[RequestRecord]) -> Result<(), SinkError> {
            Err(SinkError::Rejected {
                message: "disk full".to_owned(),
            })
        }
    }

    fn engine_with(
        profiles: Vec<AgentProfile>,
        client: ScriptedDecisionClient,
        sink: Box<dyn ResultSink>,
    ) -> Result<Engine<ScriptedDecisionClient>, EngineError> {
        Engine::new(
            &ShowConfig::default(),
            client,
            Box::new(InMemoryDirectory::new(profiles)),
            sink,
        )
    }

    #[tokio::test]
    async fn zero_ticks_is_a_no_op() {
        let mut engine =
            engine_with(Vec::new(), ScriptedDecisionClient::new(), Box::new(MemorySink::new()))
                .unwrap();
        let results = engine.run_ticks(0).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.state().current_tick, 0);
    }

    #[tokio::test]
    async fn results_reach_the_sink() {
        let sink = MemorySink::new();
        let mut engine = engine_with(
            vec![AgentProfile::new("Fans", "crowd")],
            ScriptedDecisionClient::new(),
            Box::new(sink.clone()),
        )
        .unwrap();
        let results = engine.run_ticks(3).await.unwrap();
        assert_eq!(sink.ticks(), results);
        assert_eq!(sink.requests().len(), 3);
    }

    #[tokio::test]
    async fn run_to_sink_streams_without_collecting() {
        let sink = MemorySink::new();
        let mut engine = engine_with(
            vec![AgentProfile::new("Fans", "crowd")],
            ScriptedDecisionClient::new(),
            Box::new(sink.clone()),
        )
        .unwrap();
        let summary = engine.run_to_sink(4).await.unwrap();
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.applied.saturating_add(summary.rejected), 4);
        let indices: Vec<u64> = sink.ticks().iter().map(|t| t.time_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(engine.state().current_tick, 4);
    }

    #[tokio::test]
    async fn sink_failure_is_not_fatal() {
        let mut engine = engine_with(
            vec![AgentProfile::new("Fans", "crowd")],
            ScriptedDecisionClient::new(),
            Box::new(BrokenSink),
        )
        .unwrap();
        let results = engine.run_ticks(2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn unknown_role_fails_before_any_tick() {
        let result = engine_with(
            vec![AgentProfile::new("Manager", "manager")],
            ScriptedDecisionClient::new(),
            Box::new(MemorySink::new()),
        );
        assert!(matches!(result, Err(EngineError::Roster { .. })));
    }

    #[tokio::test]
    async fn hints_reach_the_next_context() {
        let promoter = AgentProfile::new("Vince", "promoter");
        let promoter_id = promoter.id;
        let client = ScriptedDecisionClient::new();
        client.push(promoter_id, Script::Respond(AgentActionResponse::new("hold")));
        let mut engine =
            engine_with(vec![promoter], client, Box::new(MemorySink::new())).unwrap();

        let mut hints = PromoterHints::new();
        hints.insert("main_event".to_owned(), serde_json::json!("ladder match"));
        engine.set_hints(&hints);
        engine.run_ticks(1).await.unwrap();
        assert_eq!(
            engine.state().hints.get("main_event"),
            Some(&serde_json::json!("ladder match"))
        );
    }

    fn feud_config(wrestlers: [&str; 2]) -> ShowConfig {
        ShowConfig {
            feuds: vec![FeudEntry {
                name: "Rex vs Mara".to_owned(),
                wrestlers: wrestlers.iter().map(|w| (*w).to_owned()).collect(),
                heat: 30,
            }],
            ..ShowConfig::default()
        }
    }

    #[test]
    fn feuds_are_seeded_from_the_directory_roster() {
        // No config roster: the names come from the directory alone.
        let rex = AgentProfile::new("Rex", "participant");
        let mara = AgentProfile::new("Mara", "participant");
        let engine = Engine::new(
            &feud_config(["Rex", "Mara"]),
            ScriptedDecisionClient::new(),
            Box::new(InMemoryDirectory::new(vec![rex, mara])),
            Box::new(MemorySink::new()),
        )
        .unwrap();
        let feud = engine.state().feuds.values().next().unwrap();
        assert_eq!(feud.heat, 30);
        assert_eq!(feud.wrestlers.len(), 2);
        assert_eq!(engine.state().wrestlers.len(), 2);
    }

    #[test]
    fn feud_naming_an_unknown_wrestler_fails_before_any_tick() {
        let rex = AgentProfile::new("Rex", "participant");
        let err = Engine::new(
            &feud_config(["Rex", "Nobody"]),
            ScriptedDecisionClient::new(),
            Box::new(InMemoryDirectory::new(vec![rex])),
            Box::new(MemorySink::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Config { .. }));
        assert!(err.to_string().contains("Nobody"));
    }
}
