//! The mutable game state and its invariants.
//!
//! [`GameState`] has a single writer: the tick scheduler folds
//! [`StateDelta`]s into it one applied action at a time, and the crowd
//! update folds a [`CrowdAggregate`] once per tick. Every fold clamps, and
//! [`GameState::check_invariants`] runs after each one so a violation stops
//! the tick before it can be committed.

use std::collections::BTreeMap;

use ringside_types::{
    AgentId, FeudId, FeudRecord, HeatUpdate, MatchPhase, MatchSignals, PromoterHints,
    SegmentSignals, StateDelta, StateSnapshot, WrestlerRecord,
};

use crate::config::BoundsConfig;
use crate::heat::{self, CrowdAggregate};

/// A state invariant was violated. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A bounded value left its range.
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfBounds {
        /// Which value.
        field: String,
        /// Its value.
        value: i64,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },

    /// The tick counter cannot advance any further.
    #[error("tick counter overflow at {current}")]
    TickOverflow {
        /// The last tick reached.
        current: u64,
    },

    /// The match flags contradict each other.
    #[error("inconsistent match state: {message}")]
    Inconsistent {
        /// What contradicts what.
        message: String,
    },
}

/// An inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// Lowest value.
    pub min: i64,
    /// Highest value.
    pub max: i64,
}

impl Range {
    /// Build a range.
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Pull `value` into the range.
    pub fn clamp(self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }

    /// Whether `value` lies inside the range.
    pub const fn contains(self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(self, field: impl Into<String>, value: i64) -> Result<(), StateError> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(StateError::OutOfBounds {
                field: field.into(),
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Clamping ranges applied to every fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Overall heat.
    pub heat: Range,
    /// Overall and per-wrestler momentum.
    pub momentum: Range,
    /// Wrestler and feud heat.
    pub entity_heat: Range,
    /// Largest change to one entity in one update.
    pub max_entity_delta: i64,
}

impl From<&BoundsConfig> for Bounds {
    fn from(config: &BoundsConfig) -> Self {
        Self {
            heat: Range::new(config.heat_min, config.heat_max),
            momentum: Range::new(config.momentum_min, config.momentum_max),
            entity_heat: Range::new(config.entity_heat_min, config.entity_heat_max),
            max_entity_delta: config.max_entity_delta,
        }
    }
}

/// The shared simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// Ticks completed so far.
    pub current_tick: u64,
    /// Overall audience engagement.
    pub heat: i64,
    /// Overall match momentum.
    pub momentum: i64,
    /// Match lifecycle phase.
    pub phase: MatchPhase,
    /// Whether a finisher has landed and a decision can be called.
    pub finish_pending: bool,
    /// Referee warnings issued in the match.
    pub warnings: u32,
    /// Per-wrestler records.
    pub wrestlers: BTreeMap<AgentId, WrestlerRecord>,
    /// Per-feud records.
    pub feuds: BTreeMap<FeudId, FeudRecord>,
    /// Promoter guidance passed into every context.
    pub hints: PromoterHints,
    /// In-ring signals not yet priced by the crowd.
    pub match_signals: MatchSignals,
    /// Segment signals not yet priced by the crowd.
    pub segment_signals: SegmentSignals,
    bounds: Bounds,
}

impl GameState {
    /// A fresh show at tick 0 with the configured opening heat and momentum.
    pub fn new(config: &BoundsConfig) -> Self {
        let bounds = Bounds::from(config);
        Self {
            current_tick: 0,
            heat: bounds.heat.clamp(config.initial_heat),
            momentum: bounds.momentum.clamp(config.initial_momentum),
            phase: MatchPhase::NotStarted,
            finish_pending: false,
            warnings: 0,
            wrestlers: BTreeMap::new(),
            feuds: BTreeMap::new(),
            hints: PromoterHints::new(),
            match_signals: MatchSignals::default(),
            segment_signals: SegmentSignals::default(),
            bounds,
        }
    }

    /// The clamping ranges in force.
    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Immutable view of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current_tick: self.current_tick,
            heat: self.heat,
            momentum: self.momentum,
            phase: self.phase,
            finish_pending: self.finish_pending,
            warnings: self.warnings,
            wrestlers: self.wrestlers.clone(),
            feuds: self.feuds.clone(),
        }
    }

    /// Make sure a wrestler record exists, returning whether one was added.
    pub fn ensure_wrestler(&mut self, id: AgentId, name: &str) -> bool {
        if self.wrestlers.contains_key(&id) {
            return false;
        }
        self.wrestlers.insert(
            id,
            WrestlerRecord {
                name: name.to_owned(),
                heat: self.bounds.entity_heat.min,
                momentum: self.bounds.momentum.clamp(0),
            },
        );
        true
    }

    /// Register a feud, clamping its starting heat.
    pub fn insert_feud(&mut self, id: FeudId, mut record: FeudRecord) {
        record.heat = self.bounds.entity_heat.clamp(record.heat);
        self.feuds.insert(id, record);
    }

    /// Merge promoter hints; later keys win.
    pub fn merge_hints(&mut self, hints: &PromoterHints) {
        for (key, value) in hints {
            self.hints.insert(key.clone(), value.clone());
        }
    }

    /// Fold one applied action's delta into the state.
    ///
    /// The crowd part of the delta is ignored here; crowd reactions are
    /// summed across the role and folded by [`GameState::apply_crowd`].
    pub fn apply(&mut self, delta: &StateDelta) {
        let b = self.bounds;

        self.heat = b.heat.clamp(self.heat.saturating_add(delta.heat));
        if delta.reset_momentum {
            self.momentum = b.momentum.clamp(0);
        }
        self.momentum = b.momentum.clamp(self.momentum.saturating_add(delta.momentum));

        for (id, change) in &delta.wrestler_momentum {
            if let Some(record) = self.wrestlers.get_mut(id) {
                record.momentum = b.momentum.clamp(record.momentum.saturating_add(*change));
            }
        }

        if let Some(phase) = delta.phase {
            self.phase = phase;
        }
        if let Some(pending) = delta.finish_pending {
            self.finish_pending = pending;
        }
        self.warnings = self.warnings.saturating_add(delta.warnings);

        self.merge_hints(&delta.hints);
        self.match_signals.merge(&delta.match_signals);
        self.segment_signals.merge(&delta.segment_signals);
    }

    /// Fold one tick's crowd reactions: overall heat moves by the crowd sum
    /// plus the price of all queued signals, clamped once. Queued signals
    /// are consumed.
    pub fn apply_crowd(&mut self, aggregate: &CrowdAggregate) -> HeatUpdate {
        let match_signals = core::mem::take(&mut self.match_signals);
        let segment_signals = core::mem::take(&mut self.segment_signals);
        let match_heat = heat::match_heat(&match_signals);
        let segment_heat = heat::segment_heat(&segment_signals);

        let before = self.heat;
        let raw = before
            .saturating_add(aggregate.total)
            .saturating_add(match_heat)
            .saturating_add(segment_heat);
        self.heat = self.bounds.heat.clamp(raw);

        for (id, delta) in &aggregate.wrestlers {
            if let Some(record) = self.wrestlers.get_mut(id) {
                record.heat = heat::wrestler_heat(record.heat, *delta, &self.bounds);
            }
        }
        for (id, delta) in &aggregate.feuds {
            if let Some(record) = self.feuds.get_mut(id) {
                record.heat = heat::feud_heat(record.heat, *delta, &self.bounds);
            }
        }

        HeatUpdate {
            reactions: aggregate.reactions,
            crowd_sum: aggregate.total,
            match_heat,
            segment_heat,
            before,
            after: self.heat,
            match_signals,
            segment_signals,
        }
    }

    /// Move to the next tick.
    pub fn advance_tick(&mut self) -> Result<u64, StateError> {
        self.current_tick = self
            .current_tick
            .checked_add(1)
            .ok_or(StateError::TickOverflow {
                current: self.current_tick,
            })?;
        Ok(self.current_tick)
    }

    /// Verify every bounded value and the match flags.
    pub fn check_invariants(&self) -> Result<(), StateError> {
        let b = self.bounds;
        b.heat.check("heat", self.heat)?;
        b.momentum.check("momentum", self.momentum)?;
        for (id, record) in &self.wrestlers {
            b.entity_heat.check(format!("wrestler {id} heat"), record.heat)?;
            b.momentum
                .check(format!("wrestler {id} momentum"), record.momentum)?;
        }
        for (id, record) in &self.feuds {
            b.entity_heat.check(format!("feud {id} heat"), record.heat)?;
        }
        if self.finish_pending && self.phase != MatchPhase::InProgress {
            return Err(StateError::Inconsistent {
                message: format!("finish pending while match is {:?}", self.phase),
            });
        }
        Ok(())
    }
}
