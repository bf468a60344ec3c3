//! Enumeration types for the Ringside show simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The part an agent plays in the show.
///
/// The declaration order is the processing order inside every tick; the
/// derived [`Ord`] follows it, so sorting by role sorts into tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books the show and steers it with hints.
    Promoter,
    /// A wrestler in the ring.
    Participant,
    /// Enforces the rules of the match.
    Referee,
    /// Reacts to what happened and drives heat.
    Crowd,
    /// Calls the action for the audience.
    Announcer,
    /// Everything happening away from the ring.
    Backstage,
}

impl Role {
    /// Every role, in the order they act within a tick.
    pub const ORDER: [Self; 6] = [
        Self::Promoter,
        Self::Participant,
        Self::Referee,
        Self::Crowd,
        Self::Announcer,
        Self::Backstage,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promoter => "promoter",
            Self::Participant => "participant",
            Self::Referee => "referee",
            Self::Crowd => "crowd",
            Self::Announcer => "announcer",
            Self::Backstage => "backstage",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name that does not match any [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl core::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ORDER
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Match lifecycle
// ---------------------------------------------------------------------------

/// Where the current match stands.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// No in-ring action has happened yet.
    #[default]
    NotStarted,
    /// The bell has rung; the match can be finished.
    InProgress,
    /// A decision has been called.
    Finished,
}

// ---------------------------------------------------------------------------
// Validation outcomes
// ---------------------------------------------------------------------------

/// Why the rulebook refused a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The chosen action was not on the menu offered in the context.
    NotOffered,
    /// The action is not in the role's action table at all.
    UnknownAction,
    /// A required parameter was absent.
    MissingParameter,
    /// A parameter was present but had the wrong type, range or referent.
    MalformedParameter,
    /// The action is valid in general but not in the current state.
    IllegalInState,
}

/// A rejection with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Machine-readable category.
    pub reason: RejectionReason,
    /// What exactly was wrong.
    pub message: String,
}

impl Rejection {
    /// Build a rejection from a reason and message.
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}: {}", self.reason, self.message)
    }
}

/// Where an agent's response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// The external decision service answered in time.
    Service,
    /// The service timed out or failed; the fallback policy chose.
    Fallback,
    /// The agent is degraded; the service was skipped entirely.
    Degraded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_matches_derived_ord() {
        let mut shuffled = vec![
            Role::Backstage,
            Role::Crowd,
            Role::Promoter,
            Role::Announcer,
            Role::Referee,
            Role::Participant,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Role::ORDER.to_vec());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Referee".parse::<Role>(), Ok(Role::Referee));
        assert_eq!(" crowd ".parse::<Role>(), Ok(Role::Crowd));
        assert_eq!(
            "manager".parse::<Role>(),
            Err(UnknownRole("manager".to_owned()))
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Backstage).ok();
        assert_eq!(json.as_deref(), Some("\"backstage\""));
    }
}
