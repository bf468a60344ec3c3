//! The rulebook: closed per-role action tables and response validation.
//!
//! Each role has a static table of [`ActionSpec`]s. The menu offered to an
//! agent is the slice of its role's table whose [`Availability`] admits the
//! current match state, so it is a pure function of role and state.
//!
//! [`RuleBook::validate`] runs every untrusted response through three
//! checks, in order:
//!
//! 1. The action was on the menu the agent was offered.
//! 2. Required parameters are present and every parameter is well-formed
//!    (type, range, and referent for wrestler and feud ids).
//! 3. The action is still legal in the state it is being folded into.
//!
//! A pass yields a [`Ruling`] (effect plus state delta); a failure yields a
//! [`Rejection`]. Neither path touches state.

use std::collections::BTreeSet;

use ringside_types::{
    AgentActionResponse, AgentId, CrowdDelta, Effect, EventContext, FeudId, MatchPhase,
    MatchSignals, ParamKind, ParameterSpec, PossibleAction, PromoterHints, Rejection,
    RejectionReason, Role, SegmentSignals, StateDelta, StateSnapshot,
};

use crate::state::GameState;

/// Referee warnings after which a disqualification can be called.
pub const DISQUALIFICATION_WARNINGS: u32 = 3;

/// Intensity of a move when the agent does not say.
pub const DEFAULT_INTENSITY: u8 = 5;

/// A static action table is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} action table: {message}")]
pub struct RulebookError {
    /// The role whose table is broken.
    pub role: Role,
    /// What is wrong with it.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// When an action may be offered and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// In every phase.
    Always,
    /// Before the bell.
    NotStarted,
    /// Before a decision has been called.
    NotFinished,
    /// While the match is running.
    InProgress,
    /// While the match is running and a finisher has landed.
    FinishPending,
    /// While the match is running and enough warnings have piled up.
    WarningsReached,
    /// After a decision has been called.
    Finished,
}

/// The slice of state that decides availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchFlags {
    /// Match phase.
    pub phase: MatchPhase,
    /// Whether a finisher has landed.
    pub finish_pending: bool,
    /// Warnings issued.
    pub warnings: u32,
}

impl From<&GameState> for MatchFlags {
    fn from(state: &GameState) -> Self {
        Self {
            phase: state.phase,
            finish_pending: state.finish_pending,
            warnings: state.warnings,
        }
    }
}

impl From<&StateSnapshot> for MatchFlags {
    fn from(snapshot: &StateSnapshot) -> Self {
        Self {
            phase: snapshot.phase,
            finish_pending: snapshot.finish_pending,
            warnings: snapshot.warnings,
        }
    }
}

impl Availability {
    /// Whether the action is available under `flags`.
    pub fn allows(self, flags: MatchFlags) -> bool {
        let running = flags.phase == MatchPhase::InProgress;
        match self {
            Self::Always => true,
            Self::NotStarted => flags.phase == MatchPhase::NotStarted,
            Self::NotFinished => flags.phase != MatchPhase::Finished,
            Self::InProgress => running,
            Self::FinishPending => running && flags.finish_pending,
            Self::WarningsReached => running && flags.warnings >= DISQUALIFICATION_WARNINGS,
            Self::Finished => flags.phase == MatchPhase::Finished,
        }
    }
}

/// What applying an action does to the show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Merge the promoter's new hints.
    Hint,
    /// Queue a promo segment signal.
    Promo,
    /// Do nothing.
    Hold,
    /// An in-ring move worth `momentum`.
    Strike {
        /// Momentum gained.
        momentum: i64,
    },
    /// A high-risk move: extra momentum and a signal.
    HighRisk,
    /// The finisher: puts a finish in play.
    Finisher,
    /// A post-match move with no effect on the score.
    PostMatch,
    /// A referee call with no effect on the score.
    Officiate,
    /// A referee warning.
    Warn,
    /// A referee count that did not end the match: a near fall.
    Count,
    /// A referee call that ends the match.
    Decision,
    /// A crowd reaction.
    Reaction,
    /// Commentary from the desk: a segment signal.
    CallAction,
    /// The desk hypes the show: direct heat.
    Hype,
    /// A run-in from the back.
    Interfere,
    /// Backstage business with no effect on the score.
    Backstage,
}

impl EffectKind {
    const fn is_in_ring(self) -> bool {
        matches!(
            self,
            Self::Strike { .. } | Self::HighRisk | Self::Finisher | Self::PostMatch
        )
    }

    const fn is_rule_enforcement(self) -> bool {
        matches!(
            self,
            Self::Officiate | Self::Warn | Self::Count | Self::Decision
        )
    }
}

/// Value supplied for a parameter when the fallback policy picks an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackValue {
    /// An integer.
    Int(i64),
    /// A string.
    Text(&'static str),
    /// An empty JSON object.
    EmptyObject,
}

impl FallbackValue {
    fn to_json(self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(v),
            Self::Text(s) => serde_json::Value::from(s),
            Self::EmptyObject => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// One parameter of an action in a static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleParam {
    /// Key in the response's parameters.
    pub name: &'static str,
    /// Accepted shape.
    pub kind: ParamKind,
    /// Whether it must be present.
    pub required: bool,
    /// Menu description.
    pub description: &'static str,
    /// Value used by the fallback policy; required parameters must have one.
    pub fallback: Option<FallbackValue>,
}

/// One action in a role's static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    /// Action name.
    pub name: &'static str,
    /// Menu description.
    pub description: &'static str,
    /// When it may be offered.
    pub availability: Availability,
    /// What it does.
    pub effect: EffectKind,
    /// Parameter constraints.
    pub params: &'static [RuleParam],
}

impl ActionSpec {
    /// The menu entry for this action.
    pub fn to_possible_action(&self) -> PossibleAction {
        PossibleAction {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            parameters: self
                .params
                .iter()
                .map(|p| ParameterSpec {
                    name: p.name.to_owned(),
                    kind: p.kind,
                    required: p.required,
                    description: p.description.to_owned(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Static tables
// ---------------------------------------------------------------------------

const fn param(
    name: &'static str,
    kind: ParamKind,
    required: bool,
    description: &'static str,
    fallback: Option<FallbackValue>,
) -> RuleParam {
    RuleParam {
        name,
        kind,
        required,
        description,
        fallback,
    }
}

const MOVE_PARAMS: &[RuleParam] = &[
    param(
        "target",
        ParamKind::WrestlerRef,
        false,
        "Wrestler the move is aimed at; defaults to the opponent",
        None,
    ),
    param(
        "intensity",
        ParamKind::Integer { min: 1, max: 10 },
        false,
        "How hard the move is thrown, 1-10",
        None,
    ),
];

const OPTIONAL_TARGET: &[RuleParam] = &[param(
    "target",
    ParamKind::WrestlerRef,
    false,
    "Wrestler the call concerns",
    None,
)];

const OPTIONAL_DESCRIPTION: &[RuleParam] = &[param(
    "description",
    ParamKind::Text,
    false,
    "What happens",
    None,
)];

const fn reaction_params(default_heat: i64) -> [RuleParam; 3] {
    [
        param(
            "heat_adjustment",
            ParamKind::Integer { min: -10, max: 10 },
            true,
            "How much the reaction moves heat, -10 to 10",
            Some(FallbackValue::Int(default_heat)),
        ),
        param(
            "target",
            ParamKind::WrestlerRef,
            false,
            "Wrestler the reaction is aimed at",
            None,
        ),
        param(
            "feud",
            ParamKind::FeudRef,
            false,
            "Feud the reaction is aimed at",
            None,
        ),
    ]
}

const CHEER_PARAMS: [RuleParam; 3] = reaction_params(2);
const BOO_PARAMS: [RuleParam; 3] = reaction_params(1);
const CHANT_PARAMS: [RuleParam; 3] = reaction_params(3);
const HECKLE_PARAMS: [RuleParam; 3] = reaction_params(1);

const PROMOTER_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "promoter_hint",
        description: "Steer the show with new booking hints",
        availability: Availability::Always,
        effect: EffectKind::Hint,
        params: &[param(
            "new_hints",
            ParamKind::Object,
            true,
            "Key/value hints merged into the show's guidance",
            Some(FallbackValue::EmptyObject),
        )],
    },
    ActionSpec {
        name: "cut_promo",
        description: "Cut a promo to build the show",
        availability: Availability::Always,
        effect: EffectKind::Promo,
        params: &[param(
            "topic",
            ParamKind::Text,
            true,
            "What the promo is about",
            Some(FallbackValue::Text("the main event")),
        )],
    },
    ActionSpec {
        name: "hold",
        description: "Let the show run",
        availability: Availability::Always,
        effect: EffectKind::Hold,
        params: &[],
    },
];

const PARTICIPANT_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "punch",
        description: "Throw a punch",
        availability: Availability::NotFinished,
        effect: EffectKind::Strike { momentum: 2 },
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "kick",
        description: "Throw a kick",
        availability: Availability::NotFinished,
        effect: EffectKind::Strike { momentum: 2 },
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "grapple",
        description: "Lock up with the opponent",
        availability: Availability::NotFinished,
        effect: EffectKind::Strike { momentum: 2 },
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "taunt",
        description: "Play to the crowd",
        availability: Availability::NotFinished,
        effect: EffectKind::Strike { momentum: 2 },
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "high_risk_move",
        description: "Go to the top rope",
        availability: Availability::NotFinished,
        effect: EffectKind::HighRisk,
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "finisher",
        description: "Hit the finishing move",
        availability: Availability::InProgress,
        effect: EffectKind::Finisher,
        params: MOVE_PARAMS,
    },
    ActionSpec {
        name: "celebrate",
        description: "Celebrate after the match",
        availability: Availability::Finished,
        effect: EffectKind::PostMatch,
        params: &[],
    },
    ActionSpec {
        name: "retreat",
        description: "Retreat up the ramp",
        availability: Availability::Finished,
        effect: EffectKind::PostMatch,
        params: &[],
    },
];

const REFEREE_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "check_gear",
        description: "Check the wrestlers before the bell",
        availability: Availability::NotStarted,
        effect: EffectKind::Officiate,
        params: &[],
    },
    ActionSpec {
        name: "count",
        description: "Count a pin attempt",
        availability: Availability::InProgress,
        effect: EffectKind::Count,
        params: &[],
    },
    ActionSpec {
        name: "warn",
        description: "Warn a wrestler for breaking the rules",
        availability: Availability::NotFinished,
        effect: EffectKind::Warn,
        params: OPTIONAL_TARGET,
    },
    ActionSpec {
        name: "pinfall",
        description: "Count the three and end the match",
        availability: Availability::FinishPending,
        effect: EffectKind::Decision,
        params: OPTIONAL_TARGET,
    },
    ActionSpec {
        name: "submission",
        description: "Call the tap-out and end the match",
        availability: Availability::FinishPending,
        effect: EffectKind::Decision,
        params: OPTIONAL_TARGET,
    },
    ActionSpec {
        name: "disqualification",
        description: "Disqualify a repeat offender",
        availability: Availability::WarningsReached,
        effect: EffectKind::Decision,
        params: OPTIONAL_TARGET,
    },
    ActionSpec {
        name: "raise_hand",
        description: "Raise the winner's hand",
        availability: Availability::Finished,
        effect: EffectKind::Officiate,
        params: OPTIONAL_TARGET,
    },
];

const CROWD_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "cheer",
        description: "Cheer the action",
        availability: Availability::Always,
        effect: EffectKind::Reaction,
        params: &CHEER_PARAMS,
    },
    ActionSpec {
        name: "boo",
        description: "Boo the action",
        availability: Availability::Always,
        effect: EffectKind::Reaction,
        params: &BOO_PARAMS,
    },
    ActionSpec {
        name: "chant",
        description: "Start a chant",
        availability: Availability::Always,
        effect: EffectKind::Reaction,
        params: &CHANT_PARAMS,
    },
    ActionSpec {
        name: "heckle",
        description: "Heckle someone",
        availability: Availability::Always,
        effect: EffectKind::Reaction,
        params: &HECKLE_PARAMS,
    },
];

const ANNOUNCER_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "call_action",
        description: "Call the action on commentary",
        availability: Availability::Always,
        effect: EffectKind::CallAction,
        params: &[param(
            "commentary",
            ParamKind::Text,
            true,
            "The call",
            Some(FallbackValue::Text("What a match we have here!")),
        )],
    },
    ActionSpec {
        name: "hype",
        description: "Hype up the crowd",
        availability: Availability::Always,
        effect: EffectKind::Hype,
        params: &[param(
            "commentary",
            ParamKind::Text,
            false,
            "The hype line",
            None,
        )],
    },
];

const BACKSTAGE_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "interfere",
        description: "Run in and interfere in the match",
        availability: Availability::InProgress,
        effect: EffectKind::Interfere,
        params: &[
            param(
                "target",
                ParamKind::WrestlerRef,
                false,
                "Wrestler on the receiving end",
                None,
            ),
            param(
                "description",
                ParamKind::Text,
                false,
                "What happens",
                None,
            ),
        ],
    },
    ActionSpec {
        name: "scout",
        description: "Scout the competition",
        availability: Availability::Always,
        effect: EffectKind::Backstage,
        params: OPTIONAL_DESCRIPTION,
    },
    ActionSpec {
        name: "stand_by",
        description: "Wait in the back",
        availability: Availability::Always,
        effect: EffectKind::Backstage,
        params: OPTIONAL_DESCRIPTION,
    },
];

/// The static action table for a role.
pub const fn table(role: Role) -> &'static [ActionSpec] {
    match role {
        Role::Promoter => PROMOTER_ACTIONS,
        Role::Participant => PARTICIPANT_ACTIONS,
        Role::Referee => REFEREE_ACTIONS,
        Role::Crowd => CROWD_ACTIONS,
        Role::Announcer => ANNOUNCER_ACTIONS,
        Role::Backstage => BACKSTAGE_ACTIONS,
    }
}

/// Check one action table for structural problems.
pub fn check_table(role: Role, actions: &[ActionSpec]) -> Result<(), RulebookError> {
    let fail = |message: String| RulebookError { role, message };

    if actions.is_empty() {
        return Err(fail("no actions defined".to_owned()));
    }
    let mut names = BTreeSet::new();
    for action in actions {
        if !names.insert(action.name) {
            return Err(fail(format!("duplicate action `{}`", action.name)));
        }
        if role == Role::Promoter && action.effect.is_in_ring() {
            return Err(fail(format!("in-ring action `{}`", action.name)));
        }
        if role == Role::Crowd && action.effect.is_rule_enforcement() {
            return Err(fail(format!("rule-enforcement action `{}`", action.name)));
        }
        let mut params = BTreeSet::new();
        for p in action.params {
            if !params.insert(p.name) {
                return Err(fail(format!(
                    "`{}` declares `{}` twice",
                    action.name, p.name
                )));
            }
            if let ParamKind::Integer { min, max } = p.kind {
                if min > max {
                    return Err(fail(format!(
                        "`{}.{}` has an empty range",
                        action.name, p.name
                    )));
                }
            }
            if p.required && p.fallback.is_none() {
                return Err(fail(format!(
                    "required `{}.{}` has no fallback value",
                    action.name, p.name
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rulebook
// ---------------------------------------------------------------------------

/// A validated response: what happened and how state changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruling {
    /// Narrative effect.
    pub effect: Effect,
    /// State change.
    pub delta: StateDelta,
}

/// Validates responses against the static tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBook;

impl RuleBook {
    /// Create a rulebook over the static tables.
    pub const fn new() -> Self {
        Self
    }

    /// Check every role's table. Run once before the first tick.
    pub fn validate_tables(&self) -> Result<(), RulebookError> {
        for role in Role::ORDER {
            check_table(role, table(role))?;
        }
        Ok(())
    }

    /// The menu for `role` given the match state.
    pub fn available_actions(&self, role: Role, flags: MatchFlags) -> Vec<PossibleAction> {
        table(role)
            .iter()
            .filter(|spec| spec.availability.allows(flags))
            .map(ActionSpec::to_possible_action)
            .collect()
    }

    /// Look up an action in a role's table.
    pub fn spec(&self, role: Role, name: &str) -> Option<&'static ActionSpec> {
        table(role).iter().find(|spec| spec.name == name)
    }

    /// Parameters that make a fallback choice of `action` valid.
    pub fn default_parameters(
        &self,
        role: Role,
        action: &str,
    ) -> serde_json::Map<String, serde_json::Value> {
        self.spec(role, action)
            .map(|spec| {
                spec.params
                    .iter()
                    .filter_map(|p| p.fallback.map(|v| (p.name.to_owned(), v.to_json())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate a response from the agent `context` was built for against
    /// the state it is about to be folded into.
    pub fn validate(
        &self,
        response: &AgentActionResponse,
        context: &EventContext,
        state: &GameState,
    ) -> Result<Ruling, Rejection> {
        let role = context.role;
        let name = response.chosen_action.as_str();

        let Some(spec) = self.spec(role, name) else {
            return Err(Rejection::new(
                RejectionReason::UnknownAction,
                format!("`{name}` is not a {role} action"),
            ));
        };
        if context.offered(name).is_none() {
            return Err(Rejection::new(
                RejectionReason::NotOffered,
                format!(
                    "`{name}` was not offered (menu: {})",
                    context.action_names().join(", ")
                ),
            ));
        }

        for p in spec.params {
            check_param(p, response, state)?;
        }

        if !spec.availability.allows(MatchFlags::from(state)) {
            return Err(Rejection::new(
                RejectionReason::IllegalInState,
                format!("`{name}` is not legal while the match is {:?}", state.phase),
            ));
        }

        Ok(rule(spec, response, context, state))
    }
}

fn present<'a>(response: &'a AgentActionResponse, key: &str) -> Option<&'a serde_json::Value> {
    response.parameters.get(key).filter(|v| !v.is_null())
}

fn check_param(
    p: &RuleParam,
    response: &AgentActionResponse,
    state: &GameState,
) -> Result<(), Rejection> {
    let Some(value) = present(response, p.name) else {
        if p.required {
            return Err(Rejection::new(
                RejectionReason::MissingParameter,
                format!("`{}` is required", p.name),
            ));
        }
        return Ok(());
    };

    let malformed =
        |what: String| Err(Rejection::new(RejectionReason::MalformedParameter, what));

    match p.kind {
        ParamKind::Integer { min, max } => match value.as_i64() {
            Some(v) if v >= min && v <= max => Ok(()),
            Some(v) => malformed(format!("`{}` = {v} is outside [{min}, {max}]", p.name)),
            None => malformed(format!("`{}` must be an integer", p.name)),
        },
        ParamKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            _ => malformed(format!("`{}` must be non-empty text", p.name)),
        },
        ParamKind::Object => {
            if value.is_object() {
                Ok(())
            } else {
                malformed(format!("`{}` must be an object", p.name))
            }
        }
        ParamKind::WrestlerRef => {
            let id = value.as_str().and_then(|s| s.parse::<AgentId>().ok());
            match id {
                Some(id) if state.wrestlers.contains_key(&id) => Ok(()),
                _ => malformed(format!("`{}` is not a known wrestler: {value}", p.name)),
            }
        }
        ParamKind::FeudRef => {
            let id = value.as_str().and_then(|s| s.parse::<FeudId>().ok());
            match id {
                Some(id) if state.feuds.contains_key(&id) => Ok(()),
                _ => malformed(format!("`{}` is not a known feud: {value}", p.name)),
            }
        }
    }
}

fn agent_param(response: &AgentActionResponse, key: &str) -> Option<AgentId> {
    present(response, key)
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn feud_param(response: &AgentActionResponse, key: &str) -> Option<FeudId> {
    present(response, key)
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn text_param(response: &AgentActionResponse, key: &str) -> Option<String> {
    present(response, key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

fn int_param(response: &AgentActionResponse, key: &str) -> Option<i64> {
    present(response, key).and_then(serde_json::Value::as_i64)
}

/// Turn a validated response into its effect and delta.
fn rule(
    spec: &ActionSpec,
    response: &AgentActionResponse,
    context: &EventContext,
    state: &GameState,
) -> Ruling {
    let actor = context.requesting_agent_id;
    let mut delta = StateDelta::default();

    let in_ring = |delta: &mut StateDelta, momentum: i64| -> Effect {
        if state.phase == MatchPhase::NotStarted {
            delta.phase = Some(MatchPhase::InProgress);
        }
        delta.momentum = momentum;
        delta.wrestler_momentum.insert(actor, momentum);
        Effect::Move {
            name: spec.name.to_owned(),
            target: agent_param(response, "target").or(context.match_context.opponent_id),
            intensity: int_param(response, "intensity")
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(DEFAULT_INTENSITY),
        }
    };
    let call = || Effect::Call {
        call: spec.name.to_owned(),
        target: agent_param(response, "target"),
    };

    let effect = match spec.effect {
        EffectKind::Hint => {
            let new_hints: PromoterHints = present(response, "new_hints")
                .and_then(serde_json::Value::as_object)
                .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            delta.hints.clone_from(&new_hints);
            Effect::Hint { new_hints }
        }
        EffectKind::Promo => {
            delta.segment_signals = SegmentSignals {
                promos: 1,
                ..SegmentSignals::default()
            };
            Effect::Promo {
                topic: text_param(response, "topic").unwrap_or_default(),
            }
        }
        EffectKind::Hold => Effect::NoOp,
        EffectKind::Strike { momentum } => in_ring(&mut delta, momentum),
        EffectKind::HighRisk => {
            delta.match_signals = MatchSignals {
                high_risk_moves: 1,
                ..MatchSignals::default()
            };
            in_ring(&mut delta, 3)
        }
        EffectKind::Finisher => {
            delta.finish_pending = Some(true);
            delta.match_signals = MatchSignals {
                finishers: 1,
                ..MatchSignals::default()
            };
            in_ring(&mut delta, 5)
        }
        EffectKind::PostMatch => Effect::Move {
            name: spec.name.to_owned(),
            target: None,
            intensity: DEFAULT_INTENSITY,
        },
        EffectKind::Officiate => call(),
        EffectKind::Warn => {
            delta.warnings = 1;
            call()
        }
        EffectKind::Count => {
            delta.finish_pending = Some(false);
            delta.match_signals = MatchSignals {
                near_falls: 1,
                ..MatchSignals::default()
            };
            call()
        }
        EffectKind::Decision => {
            delta.phase = Some(MatchPhase::Finished);
            delta.finish_pending = Some(false);
            delta.reset_momentum = true;
            delta.heat = 1;
            call()
        }
        EffectKind::Reaction => {
            let heat_adjustment = int_param(response, "heat_adjustment").unwrap_or(0);
            delta.crowd = Some(CrowdDelta {
                heat: heat_adjustment,
                wrestler: agent_param(response, "target"),
                feud: feud_param(response, "feud"),
            });
            Effect::Reaction {
                reaction: spec.name.to_owned(),
                heat_adjustment,
            }
        }
        EffectKind::CallAction => {
            delta.segment_signals = SegmentSignals {
                commentary: 1,
                ..SegmentSignals::default()
            };
            Effect::Commentary {
                text: text_param(response, "commentary").unwrap_or_default(),
            }
        }
        EffectKind::Hype => {
            delta.heat = 2;
            Effect::Commentary {
                text: text_param(response, "commentary").unwrap_or_default(),
            }
        }
        EffectKind::Interfere => {
            delta.heat = 1;
            delta.momentum = 1;
            delta.match_signals = MatchSignals {
                interferences: 1,
                ..MatchSignals::default()
            };
            Effect::Backstage {
                action: spec.name.to_owned(),
            }
        }
        EffectKind::Backstage => Effect::Backstage {
            action: spec.name.to_owned(),
        },
    };

    Ruling { effect, delta }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ringside_types::MatchContext;

    use super::*;
    use crate::config::BoundsConfig;

    fn flags(phase: MatchPhase, finish_pending: bool, warnings: u32) -> MatchFlags {
        MatchFlags {
            phase,
            finish_pending,
            warnings,
        }
    }

    fn names(actions: &[PossibleAction]) -> Vec<&str> {
        actions.iter().map(|a| a.name.as_str()).collect()
    }

    fn context_for(role: Role, state: &GameState) -> EventContext {
        let snapshot = state.snapshot();
        EventContext {
            requesting_agent_id: AgentId::new(),
            agent_name: "Tester".to_owned(),
            persona: String::new(),
            role,
            available_actions: RuleBook::new().available_actions(role, MatchFlags::from(state)),
            match_context: MatchContext {
                phase: snapshot.phase,
                stipulation: "StandardMatch".to_owned(),
                opponent_id: None,
                segment: snapshot.current_tick,
                mode: "tick".to_owned(),
                finish_pending: snapshot.finish_pending,
                warnings: snapshot.warnings,
            },
            state_snapshot: snapshot,
            promoter_hints: PromoterHints::new(),
        }
    }

    fn state() -> GameState {
        GameState::new(&BoundsConfig::default())
    }

    #[test]
    fn static_tables_are_well_formed() {
        assert!(RuleBook::new().validate_tables().is_ok());
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = check_table(Role::Crowd, &[]).unwrap_err();
        assert_eq!(err.role, Role::Crowd);
    }

    #[test]
    fn promoter_table_with_in_ring_action_is_rejected() {
        let bad = [ActionSpec {
            name: "dropkick",
            description: "",
            availability: Availability::Always,
            effect: EffectKind::Strike { momentum: 2 },
            params: &[],
        }];
        assert!(check_table(Role::Promoter, &bad).is_err());
    }

    #[test]
    fn crowd_table_with_enforcement_action_is_rejected() {
        let bad = [ActionSpec {
            name: "count",
            description: "",
            availability: Availability::Always,
            effect: EffectKind::Count,
            params: &[],
        }];
        assert!(check_table(Role::Crowd, &bad).is_err());
    }

    #[test]
    fn required_param_without_fallback_is_rejected() {
        const PARAMS: &[RuleParam] = &[param("x", ParamKind::Text, true, "", None)];
        let bad = [ActionSpec {
            name: "shout",
            description: "",
            availability: Availability::Always,
            effect: EffectKind::Reaction,
            params: PARAMS,
        }];
        assert!(check_table(Role::Crowd, &bad).is_err());
    }

    #[test]
    fn referee_menu_mid_match_is_count_and_warn() {
        let book = RuleBook::new();
        let menu = book.available_actions(Role::Referee, flags(MatchPhase::InProgress, false, 0));
        assert_eq!(names(&menu), vec!["count", "warn"]);
    }

    #[test]
    fn referee_menu_grows_with_finish_and_warnings() {
        let book = RuleBook::new();
        let menu = book.available_actions(Role::Referee, flags(MatchPhase::InProgress, true, 3));
        assert_eq!(
            names(&menu),
            vec!["count", "warn", "pinfall", "submission", "disqualification"]
        );
        let after = book.available_actions(Role::Referee, flags(MatchPhase::Finished, false, 3));
        assert_eq!(names(&after), vec!["raise_hand"]);
    }

    #[test]
    fn every_role_has_a_menu_in_every_phase() {
        let book = RuleBook::new();
        for role in Role::ORDER {
            for phase in [
                MatchPhase::NotStarted,
                MatchPhase::InProgress,
                MatchPhase::Finished,
            ] {
                assert!(
                    !book.available_actions(role, flags(phase, false, 0)).is_empty(),
                    "{role} has no actions while {phase:?}"
                );
            }
        }
    }

    #[test]
    fn unoffered_action_is_rejected() {
        let s = state();
        let ctx = context_for(Role::Referee, &s);
        let err = RuleBook::new()
            .validate(&AgentActionResponse::new("pinfall"), &ctx, &s)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::NotOffered);
    }

    #[test]
    fn foreign_action_is_unknown() {
        let s = state();
        let ctx = context_for(Role::Promoter, &s);
        let err = RuleBook::new()
            .validate(&AgentActionResponse::new("grapple"), &ctx, &s)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::UnknownAction);
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let s = state();
        let ctx = context_for(Role::Crowd, &s);
        let err = RuleBook::new()
            .validate(&AgentActionResponse::new("cheer"), &ctx, &s)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::MissingParameter);
    }

    #[test]
    fn out_of_range_parameter_is_malformed() {
        let s = state();
        let ctx = context_for(Role::Crowd, &s);
        let response = AgentActionResponse::new("cheer").with_param("heat_adjustment", 11);
        let err = RuleBook::new().validate(&response, &ctx, &s).unwrap_err();
        assert_eq!(err.reason, RejectionReason::MalformedParameter);
    }

    #[test]
    fn unknown_wrestler_target_is_malformed() {
        let s = state();
        let ctx = context_for(Role::Crowd, &s);
        let response = AgentActionResponse::new("boo")
            .with_param("heat_adjustment", 1)
            .with_param("target", AgentId::new().to_string());
        let err = RuleBook::new().validate(&response, &ctx, &s).unwrap_err();
        assert_eq!(err.reason, RejectionReason::MalformedParameter);
    }

    #[test]
    fn action_that_became_illegal_is_rejected() {
        let mut s = state();
        s.phase = MatchPhase::InProgress;
        s.finish_pending = true;
        let ctx = context_for(Role::Referee, &s);
        s.phase = MatchPhase::Finished;
        s.finish_pending = false;
        let err = RuleBook::new()
            .validate(&AgentActionResponse::new("pinfall"), &ctx, &s)
            .unwrap_err();
        assert_eq!(err.reason, RejectionReason::IllegalInState);
    }

    #[test]
    fn grapple_starts_the_match_and_builds_momentum() {
        let mut s = state();
        let ctx = context_for(Role::Participant, &s);
        s.ensure_wrestler(ctx.requesting_agent_id, "Rex");
        let ruling = RuleBook::new()
            .validate(&AgentActionResponse::new("grapple"), &ctx, &s)
            .unwrap();
        assert_eq!(ruling.delta.phase, Some(MatchPhase::InProgress));
        assert_eq!(ruling.delta.momentum, 2);
        assert_eq!(
            ruling.delta.wrestler_momentum.get(&ctx.requesting_agent_id),
            Some(&2)
        );
        assert!(matches!(ruling.effect, Effect::Move { intensity: 5, .. }));
    }

    #[test]
    fn pinfall_ends_the_match() {
        let mut s = state();
        s.phase = MatchPhase::InProgress;
        s.finish_pending = true;
        let ctx = context_for(Role::Referee, &s);
        let ruling = RuleBook::new()
            .validate(&AgentActionResponse::new("pinfall"), &ctx, &s)
            .unwrap();
        assert_eq!(ruling.delta.phase, Some(MatchPhase::Finished));
        assert!(ruling.delta.reset_momentum);
        assert_eq!(ruling.delta.heat, 1);
    }

    #[test]
    fn crowd_reaction_is_held_back_as_crowd_delta() {
        let s = state();
        let ctx = context_for(Role::Crowd, &s);
        let response = AgentActionResponse::new("chant").with_param("heat_adjustment", 7);
        let ruling = RuleBook::new().validate(&response, &ctx, &s).unwrap();
        assert_eq!(ruling.delta.heat, 0);
        assert_eq!(ruling.delta.crowd.map(|c| c.heat), Some(7));
    }

    #[test]
    fn promoter_hint_carries_new_hints() {
        let s = state();
        let ctx = context_for(Role::Promoter, &s);
        let response = AgentActionResponse::new("promoter_hint")
            .with_param("new_hints", serde_json::json!({"main_event": "title match"}));
        let ruling = RuleBook::new().validate(&response, &ctx, &s).unwrap();
        assert_eq!(
            ruling.delta.hints.get("main_event"),
            Some(&serde_json::json!("title match"))
        );
    }

    #[test]
    fn default_parameters_make_fallback_choices_valid() {
        let book = RuleBook::new();
        let s = state();
        for role in Role::ORDER {
            let ctx = context_for(role, &s);
            for action in &ctx.available_actions {
                let mut response = AgentActionResponse::new(action.name.clone());
                response.parameters = book.default_parameters(role, &action.name);
                assert!(
                    book.validate(&response, &ctx, &s).is_ok(),
                    "fallback {role}/{} did not validate",
                    action.name
                );
            }
        }
    }
}
