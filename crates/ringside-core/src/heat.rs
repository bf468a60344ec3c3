//! Heat model: pure functions turning show events into engagement deltas.
//!
//! In-ring and segment events are not applied to heat when they happen.
//! They queue up as [`MatchSignals`] and [`SegmentSignals`] and are priced
//! here, with fixed weights, when the crowd reacts. Crowd reactions within
//! one tick are summed first and the sum is clamped once.

use std::collections::BTreeMap;

use ringside_types::{AgentId, CrowdDelta, FeudId, MatchSignals, SegmentSignals};

use crate::state::Bounds;

/// Heat per near fall.
pub const NEAR_FALL_WEIGHT: i64 = 3;
/// Heat per high-risk move.
pub const HIGH_RISK_WEIGHT: i64 = 2;
/// Heat per finisher.
pub const FINISHER_WEIGHT: i64 = 5;
/// Heat per interference.
pub const INTERFERENCE_WEIGHT: i64 = 1;
/// Heat per promo.
pub const PROMO_WEIGHT: i64 = 2;
/// Heat per commentary call.
pub const COMMENTARY_WEIGHT: i64 = 1;

fn weighted(count: u32, weight: i64) -> i64 {
    i64::from(count).saturating_mul(weight)
}

/// Heat generated by queued in-ring events.
///
/// An empty signal set yields 0; a set holding only a `base` yields that base.
pub fn match_heat(signals: &MatchSignals) -> i64 {
    signals
        .base
        .saturating_add(weighted(signals.near_falls, NEAR_FALL_WEIGHT))
        .saturating_add(weighted(signals.high_risk_moves, HIGH_RISK_WEIGHT))
        .saturating_add(weighted(signals.finishers, FINISHER_WEIGHT))
        .saturating_add(weighted(signals.interferences, INTERFERENCE_WEIGHT))
}

/// Heat generated by queued segment events.
pub fn segment_heat(signals: &SegmentSignals) -> i64 {
    signals
        .base
        .saturating_add(weighted(signals.promos, PROMO_WEIGHT))
        .saturating_add(weighted(signals.commentary, COMMENTARY_WEIGHT))
}

fn bounded_entity_heat(current: i64, delta: i64, bounds: &Bounds) -> i64 {
    let limit = bounds.max_entity_delta;
    let step = delta.max(limit.saturating_neg()).min(limit);
    bounds.entity_heat.clamp(current.saturating_add(step))
}

/// New heat for a wrestler after a crowd delta.
pub fn wrestler_heat(current: i64, delta: i64, bounds: &Bounds) -> i64 {
    bounded_entity_heat(current, delta, bounds)
}

/// New heat for a feud after a crowd delta.
pub fn feud_heat(current: i64, delta: i64, bounds: &Bounds) -> i64 {
    bounded_entity_heat(current, delta, bounds)
}

/// One tick's crowd reactions, summed per target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrowdAggregate {
    /// Number of reactions folded in.
    pub reactions: u32,
    /// Sum of all heat adjustments.
    pub total: i64,
    /// Sum per targeted wrestler.
    pub wrestlers: BTreeMap<AgentId, i64>,
    /// Sum per targeted feud.
    pub feuds: BTreeMap<FeudId, i64>,
}

impl CrowdAggregate {
    /// Fold one reaction into the running sums.
    pub fn add(&mut self, delta: &CrowdDelta) {
        self.reactions = self.reactions.saturating_add(1);
        self.total = self.total.saturating_add(delta.heat);
        if let Some(wrestler) = delta.wrestler {
            let sum = self.wrestlers.entry(wrestler).or_insert(0);
            *sum = sum.saturating_add(delta.heat);
        }
        if let Some(feud) = delta.feud {
            let sum = self.feuds.entry(feud).or_insert(0);
            *sum = sum.saturating_add(delta.heat);
        }
    }

    /// Whether any reaction was folded in.
    pub const fn is_empty(&self) -> bool {
        self.reactions == 0
    }
}

impl<'a> FromIterator<&'a CrowdDelta> for CrowdAggregate {
    fn from_iter<I: IntoIterator<Item = &'a CrowdDelta>>(iter: I) -> Self {
        let mut aggregate = Self::default();
        for delta in iter {
            aggregate.add(delta);
        }
        aggregate
    }
}
